//! Error taxonomy for the storage layer.

use thiserror::Error;

/// Failure modes surfaced by a repository.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A row with the same unique key already exists.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The underlying SQLite connection returned an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored JSON column failed to deserialize.
    #[error("corrupt row in {table}: {source}")]
    Corrupt {
        /// Table the row was read from.
        table: &'static str,
        /// Underlying deserialization error.
        source: serde_json::Error,
    },
    /// The blocking database task panicked or was cancelled.
    #[error("database task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Convenience alias for a storage-layer result.
pub type StorageResult<T> = Result<T, StorageError>;
