//! Protocol errors and JSON framing.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or decoding protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The body is not valid JSON or does not match the message shape.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The message is well-formed but violates a protocol rule.
    #[error("invalid message: {0}")]
    Invalid(String),
}

impl ProtocolError {
    /// Creates an invalid message error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// A message exchanged as a JSON body.
pub trait WireMessage: Serialize + DeserializeOwned + Sized {
    /// Encodes to JSON bytes.
    fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
