//! Test fixtures and database helpers.

use revsync_core::{
    CoreResult, Database, Fields, ProjectId, RecordId, StoreConfig, TableName, TableRegistry,
};
use revsync_server::{ServerConfig, SyncServer, Validation, ValidationGate};
use serde_json::Value;
use std::sync::Arc;

/// Returns a table name, panicking on an invalid one.
pub fn table(name: &str) -> TableName {
    TableName::new(name).expect("valid table name")
}

/// Converts a JSON object literal into record fields.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Fields of a site in `project`.
pub fn site_fields(project: ProjectId, name: &str) -> Fields {
    fields(serde_json::json!({ "project": project.to_string(), "name": name }))
}

/// Opens a tracked database with the survey schema.
pub fn tracked_db() -> Arc<Database> {
    Arc::new(
        Database::open_tracked(StoreConfig::default(), TableRegistry::survey())
            .expect("open tracked database"),
    )
}

/// A server over a fresh tracked database.
pub fn test_server() -> SyncServer {
    SyncServer::with_database(ServerConfig::default(), tracked_db())
}

/// A server whose pushes go through `gate`.
pub fn test_server_with_gate(gate: impl ValidationGate + 'static) -> SyncServer {
    SyncServer::with_collaborators(
        ServerConfig::default(),
        tracked_db(),
        Arc::new(revsync_server::StoredRecordSerializer),
        Arc::new(gate),
    )
}

/// A project with one site, sample event and transect.
#[derive(Debug, Clone, Copy)]
pub struct SurveyFixture {
    /// The project.
    pub project: ProjectId,
    /// A site in the project.
    pub site: RecordId,
    /// A sample event at the site.
    pub event: RecordId,
    /// A transect of the sample event.
    pub transect: RecordId,
}

impl SurveyFixture {
    /// Inserts the fixture in one transaction.
    pub fn seed(db: &Database) -> CoreResult<Self> {
        let fixture = Self {
            project: ProjectId::new(),
            site: RecordId::new(),
            event: RecordId::new(),
            transect: RecordId::new(),
        };
        db.write(None, |txn| {
            txn.insert(
                &TableName::project(),
                fixture.project.into(),
                fields(serde_json::json!({ "name": "Reef survey" })),
            )?;
            txn.insert(&table("site"), fixture.site, site_fields(fixture.project, "North"))?;
            txn.insert(
                &table("sample_event"),
                fixture.event,
                fields(serde_json::json!({ "site": fixture.site.to_string() })),
            )?;
            txn.insert(
                &table("transect"),
                fixture.transect,
                fields(serde_json::json!({ "sample_event": fixture.event.to_string(), "len": 50 })),
            )
        })?;
        Ok(fixture)
    }
}

/// Rejects records whose `field` equals `value`.
#[derive(Debug, Clone)]
pub struct RejectFieldValue {
    field: String,
    value: Value,
}

impl RejectFieldValue {
    /// Creates the gate.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl ValidationGate for RejectFieldValue {
    fn validate(&self, _table: &TableName, fields: &Fields) -> Validation {
        if fields.get(&self.field) == Some(&self.value) {
            Validation::reject(format!("{} may not be {}", self.field, self.value))
        } else {
            Validation::Accept
        }
    }
}

/// Requires a set of fields on one table.
#[derive(Debug, Clone)]
pub struct RequiredFields {
    table: TableName,
    fields: Vec<String>,
}

impl RequiredFields {
    /// Creates the gate.
    pub fn new(table: TableName, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            table,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl ValidationGate for RequiredFields {
    fn validate(&self, table: &TableName, fields: &Fields) -> Validation {
        if *table != self.table {
            return Validation::Accept;
        }
        match self
            .fields
            .iter()
            .find(|f| fields.get(f.as_str()).map_or(true, Value::is_null))
        {
            Some(missing) => Validation::reject(format!("{missing} is required")),
            None => Validation::Accept,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn seeded_fixture_is_tracked() {
        let db = tracked_db();
        let fixture = SurveyFixture::seed(&db).unwrap();
        assert!(db.snapshot().get(&table("transect"), fixture.transect).is_some());
        assert_eq!(db.snapshot().ledger().len(), 4);
    }

    #[test]
    fn gates() {
        let site = table("site");
        let gate = RejectFieldValue::new("name", "bad");
        assert!(!gate.validate(&site, &fields(json!({ "name": "bad" }))).is_accept());
        assert!(gate.validate(&site, &fields(json!({ "name": "ok" }))).is_accept());

        let required = RequiredFields::new(site.clone(), ["name"]);
        assert!(!required.validate(&site, &fields(json!({ "name": null }))).is_accept());
        assert!(required.validate(&table("transect"), &Fields::new()).is_accept());
    }
}
