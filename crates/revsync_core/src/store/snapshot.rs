//! Committed state and read-only snapshots.

use crate::ledger::{LedgerState, RevisionEntry};
use crate::schema::{RowSource, TableRegistry};
use crate::types::{Fields, Ordinal, RecordId, RecordKey, TableName};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a commit makes visible: data rows and the ledger.
#[derive(Debug, Clone, Default)]
pub(crate) struct DbState {
    pub(crate) rows: HashMap<TableName, HashMap<RecordId, Fields>>,
    pub(crate) ledger: LedgerState,
}

impl DbState {
    pub(crate) fn row(&self, table: &TableName, id: RecordId) -> Option<&Fields> {
        self.rows.get(table).and_then(|rows| rows.get(&id))
    }
}

/// An immutable view of the committed state.
///
/// Snapshots are cheap to take and never observe writes that commit after
/// they were taken. Pulls read exclusively through snapshots.
#[derive(Debug, Clone)]
pub struct Snapshot {
    state: Arc<DbState>,
    registry: Arc<TableRegistry>,
}

impl Snapshot {
    pub(crate) fn new(state: Arc<DbState>, registry: Arc<TableRegistry>) -> Self {
        Self { state, registry }
    }

    /// Returns a row's fields.
    pub fn get(&self, table: &TableName, id: RecordId) -> Option<&Fields> {
        self.state.row(table, id)
    }

    /// Returns the number of live rows in a table.
    pub fn row_count(&self, table: &TableName) -> usize {
        self.state.rows.get(table).map_or(0, HashMap::len)
    }

    /// Returns the current revision entry of a record.
    pub fn revision(&self, key: &RecordKey) -> Option<&RevisionEntry> {
        self.state.ledger.current(key)
    }

    /// Returns the committed ledger.
    pub fn ledger(&self) -> &LedgerState {
        &self.state.ledger
    }

    /// Returns the most recently allocated ordinal.
    pub fn latest_ordinal(&self) -> Ordinal {
        self.state.ledger.latest_ordinal()
    }

    /// Returns the table registry.
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }
}

impl RowSource for Snapshot {
    fn row(&self, table: &TableName, id: RecordId) -> Option<&Fields> {
        self.get(table, id)
    }
}
