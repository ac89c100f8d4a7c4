//! Collaborators consulted by the sync services.
//!
//! The pull service turns live records into payloads through a
//! [`RecordSerializer`]; the push service asks a [`ValidationGate`] before it
//! writes a client record. Both are plain traits so a deployment can plug in
//! its own domain rules.

use crate::error::ServerResult;
use revsync_core::{Fields, RecordId, Snapshot, TableName};
use serde_json::Value;

/// Produces the wire payload of a live record.
pub trait RecordSerializer: Send + Sync {
    /// Serializes `table/id` as seen by `snapshot`.
    ///
    /// Returns `Ok(None)` if the record is not present. The payload must be
    /// a JSON object.
    fn serialize(
        &self,
        snapshot: &Snapshot,
        table: &TableName,
        id: RecordId,
    ) -> ServerResult<Option<Value>>;
}

/// Serializes the stored fields of a record with its `id` added.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredRecordSerializer;

impl RecordSerializer for StoredRecordSerializer {
    fn serialize(
        &self,
        snapshot: &Snapshot,
        table: &TableName,
        id: RecordId,
    ) -> ServerResult<Option<Value>> {
        Ok(snapshot.get(table, id).map(|fields| {
            let mut payload = fields.clone();
            payload.insert("id".into(), Value::String(id.to_string()));
            Value::Object(payload)
        }))
    }
}

/// Verdict of a [`ValidationGate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The record may be written.
    Accept,
    /// The record is refused, with a reason reported to the client.
    Reject(String),
}

impl Validation {
    /// Creates a rejection.
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Reject(reason.into())
    }

    /// Returns true if accepted.
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Validates a pushed record before it is written.
pub trait ValidationGate: Send + Sync {
    /// Checks the fields a client submitted for `table`.
    fn validate(&self, table: &TableName, fields: &Fields) -> Validation;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ValidationGate for AcceptAll {
    fn validate(&self, _table: &TableName, _fields: &Fields) -> Validation {
        Validation::Accept
    }
}
