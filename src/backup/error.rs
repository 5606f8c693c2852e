//! Error types for backup and restore operations.

use thiserror::Error;

/// Errors that can occur during backup and restore operations.
///
/// Every failure an operation can report falls into exactly one of these
/// categories, so callers at the operation boundary can distinguish a bad
/// request (`Validation`, `NotFound`) from an engine failure (`Generation`,
/// `Restore`, `Snapshot`). A `Restore` error always means the store is
/// exactly as it was before the restore attempt began.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The supplied backup filename does not match the required pattern.
    #[error("invalid backup filename: {0}")]
    Validation(String),

    /// The referenced backup is absent from the catalog.
    #[error("backup not found: {0}")]
    NotFound(String),

    /// Dump generation failed (a store read or a catalog write).
    #[error("backup generation failed: {0}")]
    Generation(String),

    /// A statement failed during replay; the transaction was rolled back.
    #[error("restore failed at statement {statement}: {detail}")]
    Restore {
        /// 1-based position of the failing statement in the script.
        statement: usize,
        /// The store's error detail for that statement.
        detail: String,
    },

    /// The pre-restore safety dump failed; the restore was not attempted.
    #[error("safety snapshot failed: {0}")]
    Snapshot(String),
}

impl BackupError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not-found error for the given backup name.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a generation error.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Create a snapshot error.
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }
}

/// A specialized `Result` type for backup operations.
pub type BackupResult<T> = Result<T, BackupError>;
