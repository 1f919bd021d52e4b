use thiserror::Error;

use crate::Version;

/// Errors that can occur when reading or writing records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write found the record at a different version.
    #[error(
        "Concurrency conflict for {record_type} {record_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        record_type: &'static str,
        record_id: String,
        expected: Version,
        actual: Version,
    },

    /// The record does not exist.
    #[error("{record_type} not found: {record_id}")]
    NotFound {
        record_type: &'static str,
        record_id: String,
    },

    /// A create-only write found an existing record.
    #[error("{record_type} already exists: {record_id}")]
    AlreadyExists {
        record_type: &'static str,
        record_id: String,
    },
}

impl StoreError {
    /// Returns true for errors that a caller should answer with a fresh read
    /// and a full retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for record store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
