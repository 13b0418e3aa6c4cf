//! Persistent store errors.

use thiserror::Error;

/// Errors that can occur when talking to the SQLite store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The SQLite driver failed.
    #[error("sqlite: {0}")]
    Driver(#[from] sqlx::Error),

    /// A value does not fit the schema.
    #[error("data: {0}")]
    InvalidData(String),
}
