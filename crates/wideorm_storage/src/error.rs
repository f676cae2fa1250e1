//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to the store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The column family does not exist.
    #[error("unknown column family: {0}")]
    UnknownColumnFamily(String),

    /// The store could not reach enough replicas for the requested level.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The request was rejected by the store.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The session is closed.
    #[error("session is closed")]
    Closed,
}
