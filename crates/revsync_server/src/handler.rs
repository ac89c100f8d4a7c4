//! Request handlers for sync endpoints.

use crate::collab::{RecordSerializer, ValidationGate};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::pull::PullService;
use crate::push::PushService;
use revsync_core::{Database, Ordinal, ProfileId, ProjectId};
use revsync_protocol::{PullParams, PullResponse, PushBatch, PushResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// The tracked database shared by every handler.
    pub db: Arc<Database>,
    pull: PullService,
    push: PushService,
}

impl HandlerContext {
    /// Creates a handler context.
    pub fn new(
        config: ServerConfig,
        db: Arc<Database>,
        serializer: Arc<dyn RecordSerializer>,
        gate: Arc<dyn ValidationGate>,
    ) -> Self {
        let pull = PullService::new(Arc::clone(&db), serializer, config.max_pull_records);
        let push = PushService::new(Arc::clone(&db), gate, config.max_push_batch);
        Self {
            config,
            db,
            pull,
            push,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always `"ok"`.
    pub status: String,
    /// The latest allocated ordinal.
    pub revision_num: Ordinal,
}

/// Handler for sync requests.
#[derive(Clone)]
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Returns the handler context.
    pub fn context(&self) -> &HandlerContext {
        &self.context
    }

    /// Handles a health probe.
    pub fn handle_health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".into(),
            revision_num: self.context.db.latest_ordinal(),
        }
    }

    /// Handles a pull request.
    pub fn handle_pull(
        &self,
        project: ProjectId,
        profile: Option<ProfileId>,
        params: PullParams,
    ) -> ServerResult<PullResponse> {
        let query = params.into_query(project, profile)?;
        self.context.pull.pull(&query)
    }

    /// Handles a push request. The caller must be identified.
    ///
    /// Records not started within `ServerConfig::request_timeout` are
    /// reported as rejected.
    pub fn handle_push(
        &self,
        project: ProjectId,
        profile: Option<ProfileId>,
        batch: PushBatch,
    ) -> ServerResult<PushResponse> {
        let deadline = Instant::now() + self.context.config.request_timeout;
        self.handle_push_until(project, profile, batch, deadline)
    }

    /// Handles a push request that must stop starting records at `deadline`.
    pub fn handle_push_until(
        &self,
        project: ProjectId,
        profile: Option<ProfileId>,
        batch: PushBatch,
        deadline: Instant,
    ) -> ServerResult<PushResponse> {
        let profile = profile.ok_or_else(|| {
            ServerError::Unauthenticated("push requires an identified profile".into())
        })?;
        let results = self.context.push.push_until(
            project,
            Some(profile),
            batch.into_records(),
            Some(deadline),
        )?;
        Ok(PushResponse { results })
    }
}
