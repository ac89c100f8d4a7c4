//! Core type definitions for revsync.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The domain columns of a tracked record.
///
/// Relation columns (for example `site` on a sample event) hold the
/// hyphenated UUID of the referenced record as a JSON string.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Position of a revision entry in the global change order.
///
/// Ordinals are allocated from a single server-wide counter, so they are
/// unique across all tables and strictly increase with every ledger write.
/// `Ordinal::ZERO` is never assigned and stands for "nothing seen yet".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Ordinal(pub u64);

impl Ordinal {
    /// The cursor of a client that has never synced.
    pub const ZERO: Ordinal = Ordinal(0);

    /// Creates an ordinal.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next ordinal, or `None` once the counter is exhausted.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Returns true for the "never synced" cursor.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rev:{}", self.0)
    }
}

impl From<u64> for Ordinal {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a record within its table.
    RecordId
);

uuid_id!(
    /// Identifier of a project, the tenancy and visibility boundary.
    ProjectId
);

uuid_id!(
    /// Identifier of a user profile.
    ProfileId
);

uuid_id!(
    /// Identifier of a revision entry. Stable across rewrites of the entry.
    RevisionId
);

impl From<ProjectId> for RecordId {
    /// A project's own record shares its id.
    fn from(project: ProjectId) -> Self {
        Self(project.0)
    }
}

/// Maximum length of a table name in bytes.
pub const MAX_TABLE_NAME_LEN: usize = 63;

/// Name of a tracked table.
///
/// Table names are non-empty, at most 63 bytes, and made of lowercase ASCII
/// letters, digits and underscores, starting with a letter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(pub(crate) String);

impl TableName {
    /// Name of the project table, the target of cascading touches.
    pub const PROJECT: &'static str = "project";

    /// Creates a validated table name.
    pub fn new(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        if Self::is_valid(&name) {
            Ok(Self(name))
        } else {
            Err(CoreError::InvalidTableName { name })
        }
    }

    /// The project table.
    #[must_use]
    pub fn project() -> Self {
        Self(Self::PROJECT.to_string())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_ascii_lowercase() => {}
            _ => return false,
        }
        name.len() <= MAX_TABLE_NAME_LEN
            && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TableName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TableName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(name: TableName) -> Self {
        name.0
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The identity of a tracked record: its table and its id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Table the record lives in.
    pub table: TableName,
    /// Record id within the table.
    pub id: RecordId,
}

impl RecordKey {
    /// Creates a record key.
    #[must_use]
    pub fn new(table: TableName, id: RecordId) -> Self {
        Self { table, id }
    }

    /// The project's own record key.
    #[must_use]
    pub fn project(project: ProjectId) -> Self {
        Self::new(TableName::project(), project.into())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.id)
    }
}

/// Kind of row mutation reported to change hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// The row did not exist before.
    Created,
    /// The row existed and was overwritten.
    Updated,
    /// The row was removed.
    Deleted,
}

impl OperationKind {
    /// Returns true for deletions.
    #[must_use]
    pub const fn is_delete(self) -> bool {
        matches!(self, OperationKind::Deleted)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Created => "created",
            OperationKind::Updated => "updated",
            OperationKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}
