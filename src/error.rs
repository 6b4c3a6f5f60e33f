//! Error taxonomy for the store. Every persistence operation returns
//! [`StoreError`] so callers (the command shim, ultimately the UI) can tell a
//! missing entity from an invariant violation from an infrastructure failure
//! without ever seeing raw SQLite errors.

use rusqlite::{Error as SqlError, ErrorCode};
use thiserror::Error;

/// Result alias used across the persistence layer.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced entity id did not resolve to a row.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// An invariant was violated: lending an unavailable copy, a duplicate
    /// ISBN, deleting an entity that is still referenced.
    #[error("{0}")]
    Conflict(String),

    /// The caller supplied structurally invalid input.
    #[error("{0}")]
    Validation(String),

    /// The underlying persistence operation failed for an infrastructure
    /// reason. The message is sanitized; the cause is logged where the error
    /// is raised.
    #[error("{0}")]
    Storage(String),
}

impl From<SqlError> for StoreError {
    /// Classify SQLite errors: constraint violations are domain conflicts
    /// (duplicate ISBN, dangling foreign key, double-open borrowing), the
    /// rest is infrastructure.
    fn from(err: SqlError) -> Self {
        if matches!(err.sqlite_error_code(), Some(ErrorCode::ConstraintViolation)) {
            StoreError::Conflict(err.to_string())
        } else {
            tracing::error!(error = %err, "storage operation failed");
            StoreError::Storage("storage operation failed".to_string())
        }
    }
}

impl StoreError {
    /// True for the "row exists but the operation is not allowed right now"
    /// class of failures, which the UI may present as retryable user errors.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}
