//! # revsync Server
//!
//! Pull/push sync server for offline-first survey clients.
//!
//! This crate provides:
//! - The pull service: incremental "changes since my cursor" per project
//! - The push service: per-record optimistic concurrency on ordinals
//! - Collaborator traits for record serialization and push validation
//! - HTTP endpoints (health, pull, push) on axum
//!
//! # Protocol
//!
//! Clients sync pull-then-push:
//! 1. Pull with the last cursor (`0` for a full sync) and store the new one
//! 2. Push local changes, each carrying the ordinal it was last pulled at
//! 3. Records answered with `conflict` are re-pulled and resolved locally
//! 4. Records left unresolved by a failed or timed-out push are retried
//!
//! Authentication happens upstream; the server trusts the `X-Profile-Id`
//! header it is given.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod collab;
mod config;
mod error;
mod handler;
pub mod http;
mod pull;
mod push;
mod server;

pub use collab::{AcceptAll, RecordSerializer, StoredRecordSerializer, Validation, ValidationGate};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, HealthStatus, RequestHandler};
pub use pull::PullService;
pub use push::{PushService, TIMED_OUT};
pub use server::SyncServer;
