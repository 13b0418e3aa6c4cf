//! Errors of the snapshot stores.

use thiserror::Error;

use crate::persistent::errors::StorageError;

/// Errors that can occur when saving or loading snapshots.
#[derive(Debug, Error)]
pub enum DbError {
    /// The SQLite store failed.
    #[error("sqlite: {0}")]
    Storage(#[from] StorageError),

    /// A snapshot could not be encoded or decoded.
    #[error("codec: {0}")]
    Codec(#[from] bincode::Error),
}

/// Result type for the snapshot stores.
pub type DbResult<T> = Result<T, DbError>;
