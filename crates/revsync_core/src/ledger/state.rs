//! Committed ledger state and change queries.

use crate::ledger::entry::{RevisionEntry, SequenceAnchor};
use crate::types::{Ordinal, ProfileId, ProjectId, RecordKey, TableName};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

/// Selection for [`LedgerState::changes_since`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeQuery {
    /// Tables to include.
    pub tables: BTreeSet<TableName>,
    /// Only entries with an ordinal strictly greater than this.
    pub since: Ordinal,
    /// Visible project. Entries of another project are excluded; entries
    /// without a project are always visible.
    pub project: Option<ProjectId>,
    /// Tables whose entries are visible only to `profile`.
    pub owner_scoped: BTreeSet<TableName>,
    /// The requesting profile.
    pub profile: Option<ProfileId>,
    /// Maximum number of entries to return.
    pub limit: Option<usize>,
}

impl ChangeQuery {
    /// Creates a query over `tables` for changes after `since`.
    pub fn new(tables: impl IntoIterator<Item = TableName>, since: Ordinal) -> Self {
        Self {
            tables: tables.into_iter().collect(),
            since,
            project: None,
            owner_scoped: BTreeSet::new(),
            profile: None,
            limit: None,
        }
    }

    /// Restricts results to a project.
    #[must_use]
    pub fn in_project(mut self, project: Option<ProjectId>) -> Self {
        self.project = project;
        self
    }

    /// Sets the requesting profile and the tables it owns privately.
    #[must_use]
    pub fn for_profile(
        mut self,
        profile: Option<ProfileId>,
        owner_scoped: impl IntoIterator<Item = TableName>,
    ) -> Self {
        self.profile = profile;
        self.owner_scoped = owner_scoped.into_iter().collect();
        self
    }

    /// Caps the number of returned entries.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, entry: &RevisionEntry) -> bool {
        if !self.tables.contains(&entry.table) {
            return false;
        }
        if let Some(project) = entry.project_id {
            if self.project != Some(project) {
                return false;
            }
        }
        if self.owner_scoped.contains(&entry.table) {
            return self.profile.is_some() && entry.profile_id == self.profile;
        }
        true
    }
}

/// The committed ledger: the counter row, one entry per record, the ordinal
/// index and the per-table anchors.
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    counter: Ordinal,
    entries: HashMap<RecordKey, RevisionEntry>,
    order: BTreeMap<Ordinal, RecordKey>,
    anchors: HashMap<TableName, SequenceAnchor>,
}

impl LedgerState {
    /// Returns the most recently allocated ordinal.
    pub fn latest_ordinal(&self) -> Ordinal {
        self.counter
    }

    /// Returns the current entry for a record.
    pub fn current(&self, key: &RecordKey) -> Option<&RevisionEntry> {
        self.entries.get(key)
    }

    /// Returns the anchor of a table.
    pub fn anchor(&self, table: &TableName) -> Option<&SequenceAnchor> {
        self.anchors.get(table)
    }

    /// Returns the number of entries, tombstones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was ever captured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns matching entries in ordinal order.
    pub fn changes_since(&self, query: &ChangeQuery) -> Vec<&RevisionEntry> {
        let limit = query.limit.unwrap_or(usize::MAX);
        self.order
            .range((Bound::Excluded(query.since), Bound::Unbounded))
            .filter_map(|(_, key)| self.entries.get(key))
            .filter(|entry| query.matches(entry))
            .take(limit)
            .collect()
    }

    pub(crate) fn set_counter(&mut self, ordinal: Ordinal) {
        debug_assert!(ordinal >= self.counter);
        self.counter = ordinal;
    }

    /// Installs an entry, replacing any previous entry for the same record.
    pub(crate) fn apply(&mut self, entry: RevisionEntry) {
        let key = entry.key();
        if let Some(previous) = self.entries.get(&key) {
            self.order.remove(&previous.ordinal);
        }
        self.order.insert(entry.ordinal, key.clone());

        let newer = self
            .anchors
            .get(&entry.table)
            .map_or(true, |anchor| anchor.ordinal < entry.ordinal);
        if newer {
            self.anchors
                .insert(entry.table.clone(), SequenceAnchor::pointing_at(&entry));
        }
        self.entries.insert(key, entry);
    }
}
