//! Error types for draftsync-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using draftsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in draftsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Key-value storage error (quota, poisoned lock, ...)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The session is still deciding which draft to load
    #[error("Draft is not ready for editing (phase: {0})")]
    NotReady(&'static str),

    /// Backend error surfaced by an operation that reports failures
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
