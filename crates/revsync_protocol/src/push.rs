//! Push messages and per-record dispositions.

use crate::error::WireMessage;
use revsync_core::{Fields, Ordinal, RecordId, TableName};
use serde::{Deserialize, Serialize};

/// One record submitted by a client.
///
/// On the wire this is the record's domain fields with the sync metadata
/// (`_table`, `_last_revision_num`, `_deleted`) mixed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRecord {
    /// Target table.
    #[serde(rename = "_table")]
    pub table: TableName,
    /// Record id.
    pub id: RecordId,
    /// The ordinal the client last saw for this record, if it ever pulled it.
    #[serde(
        rename = "_last_revision_num",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_seen: Option<Ordinal>,
    /// True if the client deleted the record locally.
    #[serde(rename = "_deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,
    /// Domain fields.
    #[serde(flatten)]
    pub fields: Fields,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl PushRecord {
    /// A create or update of `id` with the given fields.
    pub fn upsert(table: TableName, id: RecordId, fields: Fields) -> Self {
        Self {
            table,
            id,
            last_seen: None,
            deleted: false,
            fields,
        }
    }

    /// A local deletion of `id`.
    pub fn delete(table: TableName, id: RecordId) -> Self {
        Self {
            table,
            id,
            last_seen: None,
            deleted: true,
            fields: Fields::new(),
        }
    }

    /// Sets the ordinal the client last saw.
    #[must_use]
    pub fn seen_at(mut self, ordinal: Ordinal) -> Self {
        self.last_seen = Some(ordinal);
        self
    }
}

/// A push request body: a JSON array of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PushBatch(pub Vec<PushRecord>);

impl PushBatch {
    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the records.
    pub fn into_records(self) -> Vec<PushRecord> {
        self.0
    }
}

impl From<Vec<PushRecord>> for PushBatch {
    fn from(records: Vec<PushRecord>) -> Self {
        Self(records)
    }
}

impl WireMessage for PushBatch {}

/// What happened to one pushed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Disposition {
    /// The change was committed at `revision_num`.
    Applied {
        /// Ordinal of the record's new entry.
        revision_num: Ordinal,
    },
    /// The server holds a newer revision; nothing was applied.
    Conflict {
        /// Ordinal of the server's current entry.
        server_revision_num: Ordinal,
    },
    /// The record was refused.
    Rejected {
        /// Why.
        reason: String,
    },
}

impl Disposition {
    /// Creates a rejection.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Returns true if the change was committed.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Returns true on a conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true on a rejection.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Returns the wire status name.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Conflict { .. } => "conflict",
            Self::Rejected { .. } => "rejected",
        }
    }
}

/// The disposition of one pushed record, with its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushOutcome {
    /// Record id.
    pub id: RecordId,
    /// Table.
    pub table: TableName,
    /// What happened.
    #[serde(flatten)]
    pub disposition: Disposition,
}

impl PushOutcome {
    /// Creates an outcome for a pushed record.
    pub fn new(record: &PushRecord, disposition: Disposition) -> Self {
        Self {
            id: record.id,
            table: record.table.clone(),
            disposition,
        }
    }
}

/// Response to a push: one outcome per submitted record, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    /// Outcomes.
    pub results: Vec<PushOutcome>,
}

impl PushResponse {
    /// Returns the number of applied records.
    pub fn applied_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.disposition.is_applied())
            .count()
    }

    /// Returns the outcomes that were not applied.
    pub fn unresolved(&self) -> impl Iterator<Item = &PushOutcome> {
        self.results.iter().filter(|r| !r.disposition.is_applied())
    }

    /// Returns true if every record was applied.
    pub fn is_fully_applied(&self) -> bool {
        self.results.iter().all(|r| r.disposition.is_applied())
    }
}

impl WireMessage for PushResponse {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_splits_metadata_from_fields() {
        let id = RecordId::new();
        let body = json!({
            "_table": "site",
            "id": id.to_string(),
            "_last_revision_num": 5,
            "name": "North",
            "project": "whatever",
        });
        let record: PushRecord = serde_json::from_value(body).unwrap();
        assert_eq!(record.table.as_str(), "site");
        assert_eq!(record.id, id);
        assert_eq!(record.last_seen, Some(Ordinal::new(5)));
        assert!(!record.deleted);
        assert_eq!(record.fields.len(), 2);
        assert!(!record.fields.contains_key("_table"));
    }

    #[test]
    fn record_without_revision_is_a_create() {
        let body = json!({
            "_table": "site",
            "id": RecordId::new().to_string(),
            "_last_revision_num": null,
        });
        let record: PushRecord = serde_json::from_value(body).unwrap();
        assert_eq!(record.last_seen, None);
        assert!(record.fields.is_empty());
    }

    #[test]
    fn batch_is_a_plain_array() {
        let batch = PushBatch::decode(
            json!([
                { "_table": "site", "id": RecordId::new().to_string(), "_deleted": true },
            ])
            .to_string()
            .as_bytes(),
        )
        .unwrap();
        assert_eq!(batch.len(), 1);
        assert!(batch.0[0].deleted);
    }

    #[test]
    fn batch_rejects_missing_id() {
        assert!(PushBatch::decode(br#"[{"_table": "site"}]"#).is_err());
    }

    #[test]
    fn outcome_wire_shape() {
        let record = PushRecord::upsert(TableName::new("site").unwrap(), RecordId::new(), Fields::new());
        let response = PushResponse {
            results: vec![
                PushOutcome::new(
                    &record,
                    Disposition::Applied {
                        revision_num: Ordinal::new(8),
                    },
                ),
                PushOutcome::new(
                    &record,
                    Disposition::Conflict {
                        server_revision_num: Ordinal::new(6),
                    },
                ),
                PushOutcome::new(&record, Disposition::rejected("name is required")),
            ],
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["results"][0]["status"], "applied");
        assert_eq!(value["results"][0]["revision_num"], 8);
        assert_eq!(value["results"][1]["status"], "conflict");
        assert_eq!(value["results"][1]["server_revision_num"], 6);
        assert_eq!(value["results"][2]["reason"], "name is required");
        assert_eq!(response.applied_count(), 1);
        assert_eq!(response.unresolved().count(), 2);

        let decoded = PushResponse::decode(&response.encode().unwrap()).unwrap();
        assert_eq!(decoded, response);
    }
}
