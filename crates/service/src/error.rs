//! Typed error enum for the service layer.
//!
//! Unifies validation, storage, and subprocess failures into a single error
//! type, enabling callers to match on specific failure modes instead of
//! downcasting opaque `anyhow::Error` boxes.

use thiserror::Error;
use trialstore_core::RecordError;
use trialstore_storage::StorageError;

/// Service-layer error unifying validation, storage, and backup failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Incoming record rejected before any write.
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] RecordError),

    /// Storage operation failed (DB, not found, duplicate, integrity).
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// `pg_dump` / `pg_restore` execution failed.
    #[error("external command: {0}")]
    ExternalCommand(String),

    /// Backup artifact missing or unparsable.
    #[error("backup: {0}")]
    Backup(String),

    /// Filesystem failure around backup artifacts or logs.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure in the service layer.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    /// Whether this error is likely transient (worth retrying).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_transient())
    }

    /// Whether the caller sent something malformed (client-class error).
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidRecord(_)
                | Self::Storage(StorageError::Duplicate(_) | StorageError::ForeignKey(_))
        )
    }

    /// Whether this error represents a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound { .. }))
    }
}
