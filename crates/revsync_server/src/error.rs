//! Error types for the sync server.

use revsync_core::CoreError;
use revsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format or parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The caller did not identify itself.
    #[error("authentication required: {0}")]
    Unauthenticated(String),

    /// Malformed protocol message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Store failure.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// The request did not finish in time.
    #[error("request timed out")]
    Timeout,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates an invalid request error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::InvalidRequest(_)
            | ServerError::Unauthenticated(_)
            | ServerError::Protocol(_) => true,
            ServerError::Store(err) => matches!(
                err,
                CoreError::InvalidTableName { .. } | CoreError::UnknownTable { .. }
            ),
            _ => false,
        }
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns true if the client may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServerError::Timeout => true,
            ServerError::Store(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::Unauthenticated(_) => 401,
            ServerError::Timeout => 504,
            _ if self.is_client_error() => 400,
            _ if self.is_retryable() => 503,
            _ => 500,
        }
    }
}
