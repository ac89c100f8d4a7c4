//! The revision ledger.
//!
//! The ledger is the authoritative record of "what changed, in which order".
//! It holds one [`RevisionEntry`] per tracked record, a single global counter
//! from which every entry write draws its [`Ordinal`](crate::Ordinal), and a
//! [`SequenceAnchor`] per table.
//!
//! Ledger writes only happen inside a [`WriteTransaction`], so the counter
//! row, the entry and the data change it describes commit or roll back
//! together. Only [`ChangeCapture`](crate::ChangeCapture) calls
//! [`RevisionLedger::record`].

mod entry;
mod state;

pub use entry::{RevisionEntry, SequenceAnchor};
pub use state::{ChangeQuery, LedgerState};

use crate::error::CoreResult;
use crate::store::WriteTransaction;
use crate::types::{ProfileId, ProjectId, RecordKey, RevisionId};
use chrono::Utc;

/// A request to advance the entry of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LedgerWrite {
    /// The record whose entry is written.
    pub key: RecordKey,
    /// Owning project.
    pub project_id: Option<ProjectId>,
    /// Profile to stamp on the entry.
    pub profile_id: Option<ProfileId>,
    /// Whether the record is now deleted.
    pub deleted: bool,
}

/// Write access to the ledger.
pub(crate) struct RevisionLedger;

impl RevisionLedger {
    /// Allocates the next ordinal and upserts the record's entry.
    ///
    /// An existing entry keeps its revision id; its ordinal, timestamp,
    /// profile, project and deleted flag are overwritten. The table's anchor
    /// moves to the new entry.
    pub(crate) fn record(
        txn: &mut WriteTransaction<'_>,
        write: LedgerWrite,
    ) -> CoreResult<RevisionEntry> {
        let ordinal = txn.allocate_ordinal()?;
        let revision_id = txn
            .revision(&write.key)
            .map(|existing| existing.revision_id)
            .unwrap_or_else(RevisionId::new);

        let entry = RevisionEntry {
            revision_id,
            table: write.key.table,
            record_id: write.key.id,
            project_id: write.project_id,
            profile_id: write.profile_id,
            updated_on: Utc::now(),
            deleted: write.deleted,
            ordinal,
        };

        tracing::trace!(
            table = %entry.table,
            record_id = %entry.record_id,
            ordinal = entry.ordinal.as_u64(),
            deleted = entry.deleted,
            "ledger entry staged"
        );

        txn.stage_entry(entry.clone());
        Ok(entry)
    }
}
