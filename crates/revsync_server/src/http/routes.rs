//! Route handlers.

use super::{run_blocking, run_with_timeout, PROFILE_HEADER};
use crate::error::{ServerError, ServerResult};
use crate::handler::{HealthStatus, RequestHandler};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use revsync_core::{ProfileId, ProjectId};
use revsync_protocol::{PullParams, PullResponse, PushBatch, PushResponse, WireMessage};
use std::time::Instant;

pub(super) async fn health(State(handler): State<RequestHandler>) -> Json<HealthStatus> {
    Json(handler.handle_health())
}

pub(super) async fn pull(
    State(handler): State<RequestHandler>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Query(params): Query<PullParams>,
) -> ServerResult<Json<PullResponse>> {
    let project = parse_project(&project_id)?;
    let profile = profile_from(&headers)?;
    tracing::debug!(project_id = %project, ?params, "pull request");

    let response =
        run_with_timeout(&handler, move |h| h.handle_pull(project, profile, params)).await?;
    Ok(Json(response))
}

pub(super) async fn push(
    State(handler): State<RequestHandler>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Json<PushResponse>> {
    let deadline = Instant::now() + handler.context().config.request_timeout;
    let project = parse_project(&project_id)?;
    let profile = profile_from(&headers)?;
    let batch = PushBatch::decode(&body)?;
    tracing::debug!(project_id = %project, records = batch.len(), "push request");

    let response = run_blocking(&handler, move |h| {
        h.handle_push_until(project, profile, batch, deadline)
    })
    .await?;
    Ok(Json(response))
}

fn parse_project(raw: &str) -> ServerResult<ProjectId> {
    raw.parse()
        .map_err(|_| ServerError::invalid(format!("invalid project id: {raw:?}")))
}

/// Reads the caller's profile. A present but malformed header is refused.
fn profile_from(headers: &HeaderMap) -> ServerResult<Option<ProfileId>> {
    let Some(value) = headers.get(PROFILE_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .map(Some)
        .ok_or_else(|| ServerError::Unauthenticated(format!("malformed {PROFILE_HEADER} header")))
}
