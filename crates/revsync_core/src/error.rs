//! Error types for revsync core.

use crate::types::{OperationKind, Ordinal, RecordId, TableName};
use std::time::Duration;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in revsync core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Table name failed validation.
    #[error("invalid table name: {name:?}")]
    InvalidTableName {
        /// The rejected name.
        name: String,
    },

    /// Table is not registered in the table registry.
    #[error("unknown table: {table}")]
    UnknownTable {
        /// The table that was looked up.
        table: TableName,
    },

    /// The owning project of a tracked record could not be determined.
    ///
    /// Raised by change capture; the enclosing transaction must abort.
    #[error("cannot resolve project for {table}/{record_id}: {reason}")]
    ProjectResolution {
        /// Table of the record being captured.
        table: TableName,
        /// The record being captured.
        record_id: RecordId,
        /// What went wrong during resolution.
        reason: String,
    },

    /// A row referenced by an update or delete does not exist.
    #[error("record not found: {table}/{record_id}")]
    RecordNotFound {
        /// Table searched.
        table: TableName,
        /// The missing record.
        record_id: RecordId,
    },

    /// A write violated a store constraint (for example a duplicate insert).
    #[error("constraint violation on {table}/{record_id}: {message}")]
    Constraint {
        /// Table written to.
        table: TableName,
        /// The offending record.
        record_id: RecordId,
        /// Description of the violation.
        message: String,
    },

    /// The writer lock could not be acquired in time.
    #[error("lock timeout after {waited:?}")]
    LockTimeout {
        /// How long the writer waited.
        waited: Duration,
    },

    /// The global ordinal counter has no values left.
    #[error("ordinal counter exhausted at {last}")]
    OrdinalsExhausted {
        /// The last allocated ordinal.
        last: Ordinal,
    },

    /// A change hook refused the mutation.
    #[error("change hook failed on {kind} of {table}/{record_id}: {reason}")]
    HookFailed {
        /// Table of the mutated row.
        table: TableName,
        /// The mutated row.
        record_id: RecordId,
        /// Kind of mutation.
        kind: OperationKind,
        /// Why the hook failed.
        reason: String,
    },

    /// Transaction was aborted.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for abort.
        reason: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a project resolution error.
    pub fn project_resolution(
        table: &TableName,
        record_id: RecordId,
        reason: impl Into<String>,
    ) -> Self {
        Self::ProjectResolution {
            table: table.clone(),
            record_id,
            reason: reason.into(),
        }
    }

    /// Creates a record not found error.
    pub fn record_not_found(table: &TableName, record_id: RecordId) -> Self {
        Self::RecordNotFound {
            table: table.clone(),
            record_id,
        }
    }

    /// Creates a constraint violation error.
    pub fn constraint(table: &TableName, record_id: RecordId, message: impl Into<String>) -> Self {
        Self::Constraint {
            table: table.clone(),
            record_id,
            message: message.into(),
        }
    }

    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if the failure is transient and the write may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::LockTimeout { .. })
    }
}
