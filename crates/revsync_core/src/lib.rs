//! # revsync Core
//!
//! Revision tracking for offline-first survey data.
//!
//! This crate provides:
//! - Record identity types (`TableName`, `RecordId`, `ProjectId`, `Ordinal`)
//! - The table registry mapping each tracked table to its project rule
//! - An in-memory transactional record store with synchronous change hooks
//! - The revision ledger: one entry per record, one global ordinal counter
//! - Change capture, the hook that keeps the ledger in step with the data
//! - A change feed announcing committed ledger writes
//!
//! ## Key Invariants
//!
//! - Every ledger write draws a fresh ordinal from one server-wide counter
//! - A data change and its ledger write commit or roll back together
//! - Entries are rewritten in place and never removed; deletions leave
//!   tombstones
//! - A tracked record whose project cannot be resolved is never captured

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod capture;
mod change_feed;
mod config;
mod error;
mod ledger;
mod schema;
mod store;
mod types;

pub use capture::ChangeCapture;
pub use change_feed::{ChangeFeed, ChangeNotice};
pub use config::StoreConfig;
pub use error::{CoreError, CoreResult};
pub use ledger::{ChangeQuery, LedgerState, RevisionEntry, SequenceAnchor};
pub use schema::{read_uuid, Hop, ProjectRule, RowSource, TableRegistry, TableSpec};
pub use store::{
    ChangeHook, Committed, Database, RowChange, Snapshot, TransactionState, WriteTransaction,
};
pub use types::{
    Fields, OperationKind, Ordinal, ProfileId, ProjectId, RecordId, RecordKey, RevisionId,
    TableName, MAX_TABLE_NAME_LEN,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
