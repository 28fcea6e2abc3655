//! Error types for the document stores.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the user, chat and feedback stores.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    DirectoryError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document could not be (de)serialized.
    #[error("malformed document: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// A record looked up by id does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl PersistenceError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
