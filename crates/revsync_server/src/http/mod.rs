//! HTTP surface of the sync server.
//!
//! Routes:
//! - `GET /health`
//! - `GET /v1/projects/:project_id/pull?revision_num=N&tables=a,b`
//! - `POST /v1/projects/:project_id/push`
//!
//! The caller's profile arrives in the [`PROFILE_HEADER`] header, set by
//! the authentication layer in front of this server. Store work runs on
//! the blocking pool. Pulls past `ServerConfig::request_timeout` answer 504;
//! pushes stop starting records at that deadline and report the rest as
//! rejected.

mod routes;

use crate::error::{ServerError, ServerResult};
use crate::handler::RequestHandler;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

/// Header carrying the caller's profile id.
pub const PROFILE_HEADER: &str = "x-profile-id";

/// Builds the router for a request handler.
pub fn router(handler: RequestHandler) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/v1/projects/:project_id/pull", get(routes::pull))
        .route("/v1/projects/:project_id/push", post(routes::push))
        .with_state(handler)
}

/// Runs `f` on the blocking pool, bounded by the request timeout.
///
/// Only for read-only work: on timeout the task is left to finish and its
/// result is discarded.
async fn run_with_timeout<T, F>(handler: &RequestHandler, f: F) -> ServerResult<T>
where
    F: FnOnce(&RequestHandler) -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    let timeout = handler.context().config.request_timeout;
    match tokio::time::timeout(timeout, run_blocking(handler, f)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(?timeout, "request timed out");
            Err(ServerError::Timeout)
        }
    }
}

/// Runs `f` on the blocking pool and waits for it to finish.
///
/// Writes go through here: their outcome is always reported, so `f` must
/// bound its own running time.
async fn run_blocking<T, F>(handler: &RequestHandler, f: F) -> ServerResult<T>
where
    F: FnOnce(&RequestHandler) -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    let worker = handler.clone();
    tokio::task::spawn_blocking(move || f(&worker))
        .await
        .map_err(|err| ServerError::Internal(format!("request worker failed: {err}")))?
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request refused");
        }
        let body = json!({
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        });
        (status, Json(body)).into_response()
    }
}
