//! Pull messages.

use crate::error::{ProtocolError, ProtocolResult, WireMessage};
use revsync_core::{Fields, Ordinal, ProfileId, ProjectId, RecordId, TableName};
use serde::{Deserialize, Serialize};

/// Query-string parameters of a pull request.
///
/// `tables` is a comma-separated list; absent or empty selects every
/// tracked table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullParams {
    /// The client's cursor. Absent or zero requests a full sync.
    #[serde(default)]
    pub revision_num: Option<u64>,
    /// Comma-separated table scope.
    #[serde(default)]
    pub tables: Option<String>,
    /// Continues a paged full sync: set it to the `full_sync` of the
    /// previous response when that response had more to come.
    #[serde(default)]
    pub full_sync: bool,
}

impl PullParams {
    /// Resolves the parameters into a query for `project` on behalf of
    /// `profile`.
    pub fn into_query(
        self,
        project: ProjectId,
        profile: Option<ProfileId>,
    ) -> ProtocolResult<PullQuery> {
        let mut tables = Vec::new();
        for name in self
            .tables
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let table = TableName::new(name)
                .map_err(|e| ProtocolError::invalid(format!("tables: {e}")))?;
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
        let since = Ordinal::new(self.revision_num.unwrap_or(0));
        Ok(PullQuery {
            project,
            profile,
            since,
            tables,
            full_sync: self.full_sync || since.is_zero(),
        })
    }
}

/// A pull request as seen by the pull service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullQuery {
    /// The project whose records are visible.
    pub project: ProjectId,
    /// The requesting profile, if known.
    pub profile: Option<ProfileId>,
    /// Return changes strictly after this ordinal.
    pub since: Ordinal,
    /// Table scope. Empty means every tracked table.
    pub tables: Vec<TableName>,
    /// The client holds nothing yet, so deletions are not reported. Stays
    /// set on every page of a full sync.
    pub full_sync: bool,
}

impl PullQuery {
    /// Creates a full-sync query over every tracked table.
    pub fn new(project: ProjectId) -> Self {
        Self {
            project,
            profile: None,
            since: Ordinal::ZERO,
            tables: Vec::new(),
            full_sync: true,
        }
    }

    /// Sets the cursor. A zero cursor starts a full sync.
    #[must_use]
    pub fn since(mut self, cursor: Ordinal) -> Self {
        self.since = cursor;
        self.full_sync = cursor.is_zero();
        self
    }

    /// Marks the query as a later page of a full sync.
    #[must_use]
    pub fn continuing_full_sync(mut self) -> Self {
        self.full_sync = true;
        self
    }

    /// Restricts the table scope.
    #[must_use]
    pub fn tables(mut self, tables: impl IntoIterator<Item = TableName>) -> Self {
        self.tables = tables.into_iter().collect();
        self
    }

    /// Sets the requesting profile.
    #[must_use]
    pub fn profile(mut self, profile: ProfileId) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Returns true for a full sync.
    pub fn is_full_sync(&self) -> bool {
        self.full_sync
    }
}

/// A live record in a pull response.
///
/// Serialized as the record payload with `_table` and `_last_revision_num`
/// added alongside the domain fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    /// Source table.
    #[serde(rename = "_table")]
    pub table: TableName,
    /// Ordinal of the record's current entry.
    #[serde(rename = "_last_revision_num")]
    pub revision_num: Ordinal,
    /// Serialized record, including `id`.
    #[serde(flatten)]
    pub data: Fields,
}

impl RecordUpdate {
    /// Returns the record id carried in the payload.
    pub fn id(&self) -> Option<RecordId> {
        self.data.get("id")?.as_str()?.parse().ok()
    }
}

/// A deleted record in a pull response. Carries only its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDelete {
    /// Source table.
    pub table: TableName,
    /// Record id.
    pub id: RecordId,
    /// Ordinal of the tombstone.
    pub revision_num: Ordinal,
}

/// Response to a pull.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Live records changed since the cursor.
    pub updates: Vec<RecordUpdate>,
    /// Records deleted since the cursor.
    pub deletes: Vec<RecordDelete>,
    /// The client's next cursor.
    pub revision_num: Ordinal,
    /// True when the response was truncated; pull again from
    /// `revision_num` for the rest.
    #[serde(default)]
    pub has_more: bool,
    /// True when this page belongs to a full sync.
    #[serde(default)]
    pub full_sync: bool,
}

impl PullResponse {
    /// Creates an empty response that leaves the cursor at `cursor`.
    pub fn empty(cursor: Ordinal) -> Self {
        Self {
            revision_num: cursor,
            ..Self::default()
        }
    }

    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Returns the number of records in the response.
    pub fn len(&self) -> usize {
        self.updates.len() + self.deletes.len()
    }
}

impl WireMessage for PullResponse {}
