//! Revision entries and sequence anchors.

use crate::types::{Ordinal, ProfileId, ProjectId, RecordId, RecordKey, RevisionId, TableName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The current revision state of one tracked record.
///
/// There is exactly one entry per (table, record). A later change rewrites
/// the entry in place with a fresh ordinal; deletions set `deleted` and keep
/// the entry so that pulls can still discover the tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionEntry {
    /// Stable identifier of this entry.
    pub revision_id: RevisionId,
    /// Table of the tracked record.
    pub table: TableName,
    /// The tracked record.
    pub record_id: RecordId,
    /// Owning project, `None` for global tables.
    pub project_id: Option<ProjectId>,
    /// Profile that made the change (the record owner for owner-scoped tables).
    pub profile_id: Option<ProfileId>,
    /// When the entry was last written.
    pub updated_on: DateTime<Utc>,
    /// Tombstone marker.
    pub deleted: bool,
    /// Position in the global change order.
    pub ordinal: Ordinal,
}

impl RevisionEntry {
    /// Returns the identity of the tracked record.
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.table.clone(), self.record_id)
    }

    /// Returns true if the entry is a tombstone.
    pub fn is_tombstone(&self) -> bool {
        self.deleted
    }
}

/// Per-table pointer at the most recently written entry.
///
/// Purely a read anchor: the ordinal stored on each entry is the source of
/// truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceAnchor {
    /// The table this anchor belongs to.
    pub table: TableName,
    /// The latest entry written for the table.
    pub revision_id: RevisionId,
    /// The record of that entry.
    pub record_id: RecordId,
    /// Ordinal of that entry.
    pub ordinal: Ordinal,
}

impl SequenceAnchor {
    /// Builds the anchor pointing at `entry`.
    pub fn pointing_at(entry: &RevisionEntry) -> Self {
        Self {
            table: entry.table.clone(),
            revision_id: entry.revision_id,
            record_id: entry.record_id,
            ordinal: entry.ordinal,
        }
    }
}
