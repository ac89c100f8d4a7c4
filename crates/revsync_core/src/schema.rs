//! Tracked tables and their project-resolution rules.
//!
//! Every tracked table maps to a [`TableSpec`] that says how a record of that
//! table finds its owning project:
//!
//! - [`ProjectRule::Own`]: the table *is* the project table.
//! - [`ProjectRule::Direct`]: the record carries a project column.
//! - [`ProjectRule::Via`]: follow a fixed chain of relation columns to an
//!   ancestor and read the ancestor's project column.
//! - [`ProjectRule::Global`]: the table is not project scoped.
//!
//! The registry is a static lookup evaluated once per capture event.

use crate::error::{CoreError, CoreResult};
use crate::types::{Fields, ProjectId, RecordId, TableName};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Read access to rows, used while walking relation chains.
///
/// Implemented by write transactions (seeing their own staged writes) and by
/// committed snapshots.
pub trait RowSource {
    /// Returns the fields of a row, or `None` if it does not exist.
    fn row(&self, table: &TableName, id: RecordId) -> Option<&Fields>;
}

/// One step of a relation chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    /// Relation column holding the id of the next record.
    pub field: String,
    /// Table of the next record.
    pub table: TableName,
}

impl Hop {
    /// Creates a hop.
    pub fn new(field: impl Into<String>, table: TableName) -> Self {
        Self {
            field: field.into(),
            table,
        }
    }
}

/// How a table resolves the project that owns its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRule {
    /// The record is a project; its id is the project id.
    Own,
    /// The record stores its project id in `field`.
    Direct {
        /// Project column.
        field: String,
    },
    /// Follow `path` to an ancestor, then read its `project_field`.
    Via {
        /// Relation chain from the record to the project-bearing ancestor.
        path: Vec<Hop>,
        /// Project column on the final ancestor.
        project_field: String,
    },
    /// The table has no project association.
    Global,
}

/// Tracking configuration for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Project-resolution rule.
    pub rule: ProjectRule,
    /// Whether a change also touches the owning project's own entry.
    pub cascade: bool,
    /// When set, records are only visible to the profile that last wrote them.
    pub owner_field: Option<String>,
}

impl TableSpec {
    /// The project table itself.
    pub fn own() -> Self {
        Self {
            rule: ProjectRule::Own,
            cascade: false,
            owner_field: None,
        }
    }

    /// A table with a direct project column.
    pub fn direct(field: impl Into<String>) -> Self {
        Self {
            rule: ProjectRule::Direct {
                field: field.into(),
            },
            cascade: false,
            owner_field: None,
        }
    }

    /// A table that reaches its project through a relation chain.
    pub fn via(path: Vec<Hop>, project_field: impl Into<String>) -> Self {
        Self {
            rule: ProjectRule::Via {
                path,
                project_field: project_field.into(),
            },
            cascade: false,
            owner_field: None,
        }
    }

    /// A project-less table.
    pub fn global() -> Self {
        Self {
            rule: ProjectRule::Global,
            cascade: false,
            owner_field: None,
        }
    }

    /// Makes changes to this table touch the owning project.
    #[must_use]
    pub fn cascading(mut self) -> Self {
        self.cascade = true;
        self
    }

    /// Restricts visibility to the writing profile.
    #[must_use]
    pub fn owned_by(mut self, field: impl Into<String>) -> Self {
        self.owner_field = Some(field.into());
        self
    }

    /// Returns true if records of this table never belong to a project.
    pub fn is_global(&self) -> bool {
        matches!(self.rule, ProjectRule::Global)
    }
}

/// Static lookup from table name to tracking configuration.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: BTreeMap<TableName, TableSpec>,
}

impl TableRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The survey schema: projects, their sites and managements, collect
    /// records, and the sample event → transect → observation chain.
    pub fn survey() -> Self {
        let t = |name: &str| TableName(name.to_string());
        let hop = |field: &str, table: &str| Hop::new(field, t(table));

        Self::new()
            .with_table(t("project"), TableSpec::own())
            .with_table(t("profile"), TableSpec::global())
            .with_table(t("choice"), TableSpec::global())
            .with_table(t("project_profile"), TableSpec::direct("project").cascading())
            .with_table(t("site"), TableSpec::direct("project").cascading())
            .with_table(t("management"), TableSpec::direct("project").cascading())
            .with_table(
                t("collect_record"),
                TableSpec::direct("project").cascading().owned_by("profile"),
            )
            .with_table(
                t("sample_event"),
                TableSpec::via(vec![hop("site", "site")], "project").cascading(),
            )
            .with_table(
                t("transect"),
                TableSpec::via(
                    vec![hop("sample_event", "sample_event"), hop("site", "site")],
                    "project",
                )
                .cascading(),
            )
            .with_table(
                t("observation"),
                TableSpec::via(
                    vec![
                        hop("transect", "transect"),
                        hop("sample_event", "sample_event"),
                        hop("site", "site"),
                    ],
                    "project",
                )
                .cascading(),
            )
    }

    /// Adds or replaces a table.
    #[must_use]
    pub fn with_table(mut self, table: TableName, spec: TableSpec) -> Self {
        self.tables.insert(table, spec);
        self
    }

    /// Looks up a table.
    pub fn get(&self, table: &TableName) -> Option<&TableSpec> {
        self.tables.get(table)
    }

    /// Looks up a table, failing for unregistered names.
    pub fn spec(&self, table: &TableName) -> CoreResult<&TableSpec> {
        self.get(table).ok_or_else(|| CoreError::UnknownTable {
            table: table.clone(),
        })
    }

    /// Returns true if the table is tracked.
    pub fn contains(&self, table: &TableName) -> bool {
        self.tables.contains_key(table)
    }

    /// Iterates over registered table names in sorted order.
    pub fn tables(&self) -> impl Iterator<Item = &TableName> {
        self.tables.keys()
    }

    /// Checks that every relation hop points at a registered table and that
    /// the project table is registered whenever a table cascades.
    pub fn validate(&self) -> CoreResult<()> {
        let project = TableName::project();
        for (table, spec) in &self.tables {
            if spec.cascade && !self.tables.contains_key(&project) {
                return Err(CoreError::invalid_operation(format!(
                    "table {table} cascades but `project` is not registered"
                )));
            }
            if let ProjectRule::Via { path, .. } = &spec.rule {
                if path.is_empty() {
                    return Err(CoreError::invalid_operation(format!(
                        "table {table} has an empty relation path"
                    )));
                }
                if let Some(hop) = path.iter().find(|hop| !self.tables.contains_key(&hop.table)) {
                    return Err(CoreError::UnknownTable {
                        table: hop.table.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolves the project owning a record.
    ///
    /// `fields` are the record's own columns (for a deletion, its columns
    /// before the delete). Ancestors are read from `source`. Returns `None`
    /// only for global tables; every other failure is a
    /// [`CoreError::ProjectResolution`].
    pub fn resolve_project(
        &self,
        source: &dyn RowSource,
        table: &TableName,
        record_id: RecordId,
        fields: &Fields,
    ) -> CoreResult<Option<ProjectId>> {
        let spec = self
            .get(table)
            .ok_or_else(|| CoreError::project_resolution(table, record_id, "table is not tracked"))?;

        match &spec.rule {
            ProjectRule::Own => Ok(Some(ProjectId::from_uuid(*record_id.as_uuid()))),
            ProjectRule::Direct { field } => {
                let uuid = read_uuid(fields, field)
                    .map_err(|reason| CoreError::project_resolution(table, record_id, reason))?;
                Ok(Some(ProjectId::from_uuid(uuid)))
            }
            ProjectRule::Via {
                path,
                project_field,
            } => {
                let mut current = fields;
                for hop in path {
                    let next = read_uuid(current, &hop.field)
                        .map_err(|reason| CoreError::project_resolution(table, record_id, reason))?;
                    current = source
                        .row(&hop.table, RecordId::from_uuid(next))
                        .ok_or_else(|| {
                            CoreError::project_resolution(
                                table,
                                record_id,
                                format!("dangling relation `{}` -> {}/{next}", hop.field, hop.table),
                            )
                        })?;
                }
                let uuid = read_uuid(current, project_field)
                    .map_err(|reason| CoreError::project_resolution(table, record_id, reason))?;
                Ok(Some(ProjectId::from_uuid(uuid)))
            }
            ProjectRule::Global => Ok(None),
        }
    }
}

/// Reads a UUID-valued column.
pub fn read_uuid(fields: &Fields, field: &str) -> Result<Uuid, String> {
    match fields.get(field) {
        Some(serde_json::Value::String(s)) => {
            Uuid::parse_str(s).map_err(|_| format!("field `{field}` is not a uuid: {s:?}"))
        }
        Some(serde_json::Value::Null) | None => Err(format!("missing field `{field}`")),
        Some(other) => Err(format!("field `{field}` is not a uuid: {other}")),
    }
}
