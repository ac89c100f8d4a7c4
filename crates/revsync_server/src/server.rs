//! Main sync server.

use crate::collab::{AcceptAll, RecordSerializer, StoredRecordSerializer, ValidationGate};
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::{HandlerContext, HealthStatus, RequestHandler};
use crate::http;
use revsync_core::{Database, Ordinal, ProfileId, ProjectId, TableRegistry};
use revsync_protocol::{PullParams, PullResponse, PushBatch, PushResponse};
use std::sync::Arc;
use tokio::net::TcpListener;

/// The sync server.
///
/// Owns the tracked database and the pull and push services, and exposes
/// them over HTTP.
///
/// # Example
///
/// ```
/// use revsync_server::{ServerConfig, SyncServer};
///
/// let server = SyncServer::new(ServerConfig::default()).unwrap();
/// assert_eq!(server.latest_ordinal().as_u64(), 0);
///
/// // `server.serve().await` binds `config.bind_addr` and serves
/// // `/health`, `/v1/projects/{id}/pull` and `/v1/projects/{id}/push`.
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a server over a fresh database with the survey schema.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let db = Database::open_tracked(config.store.clone(), TableRegistry::survey())?;
        Ok(Self::with_database(config, Arc::new(db)))
    }

    /// Creates a server over an existing tracked database.
    pub fn with_database(config: ServerConfig, db: Arc<Database>) -> Self {
        Self::with_collaborators(
            config,
            db,
            Arc::new(StoredRecordSerializer),
            Arc::new(AcceptAll),
        )
    }

    /// Creates a server with a custom serializer and validation gate.
    pub fn with_collaborators(
        config: ServerConfig,
        db: Arc<Database>,
        serializer: Arc<dyn RecordSerializer>,
        gate: Arc<dyn ValidationGate>,
    ) -> Self {
        let context = Arc::new(HandlerContext::new(config, db, serializer, gate));
        let handler = RequestHandler::new(Arc::clone(&context));
        Self { handler, context }
    }

    /// Handles a pull request.
    pub fn handle_pull(
        &self,
        project: ProjectId,
        profile: Option<ProfileId>,
        params: PullParams,
    ) -> ServerResult<PullResponse> {
        self.handler.handle_pull(project, profile, params)
    }

    /// Handles a push request.
    pub fn handle_push(
        &self,
        project: ProjectId,
        profile: Option<ProfileId>,
        batch: PushBatch,
    ) -> ServerResult<PushResponse> {
        self.handler.handle_push(project, profile, batch)
    }

    /// Returns the health status.
    pub fn health(&self) -> HealthStatus {
        self.handler.handle_health()
    }

    /// Returns the latest allocated ordinal.
    pub fn latest_ordinal(&self) -> Ordinal {
        self.context.db.latest_ordinal()
    }

    /// Returns the database.
    pub fn database(&self) -> &Arc<Database> {
        &self.context.db
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Builds the HTTP router.
    pub fn router(&self) -> axum::Router {
        http::router(self.handler.clone())
    }

    /// Binds the configured address and serves until the process exits.
    pub async fn serve(self) -> ServerResult<()> {
        let addr = self.context.config.bind_addr;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "revsync server listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
