//! # revsync Protocol
//!
//! Wire types for the revsync pull and push endpoints.
//!
//! This crate provides:
//! - `PullParams` / `PullQuery` and `PullResponse` for incremental pulls
//! - `PushRecord`, `PushBatch` and `PushResponse` for pushes
//! - `Disposition`, the per-record result of a push
//! - JSON framing through `WireMessage`
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod pull;
mod push;

pub use error::{ProtocolError, ProtocolResult, WireMessage};
pub use pull::{PullParams, PullQuery, PullResponse, RecordDelete, RecordUpdate};
pub use push::{Disposition, PushBatch, PushOutcome, PushRecord, PushResponse};
