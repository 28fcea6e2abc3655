//! Error types for document collections.

use thiserror::Error;

/// Errors that can occur while ingesting or searching documents.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Failed to read or write the chunk store.
    #[error("database error: {0}")]
    DatabaseError(String),

    /// Failed to generate embeddings.
    #[error("embedding error: {0}")]
    EmbeddingError(String),

    /// Failed to serialize/deserialize stored chunks.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The uploaded file type is not supported.
    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),

    /// Text could not be extracted from a supported file.
    #[error("could not extract text from {file}: {reason}")]
    ExtractionFailed { file: String, reason: String },

    /// The document contained no text worth indexing.
    #[error("no text found in {0}")]
    EmptyDocument(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for memory operations.
pub type Result<T> = std::result::Result<T, MemoryError>;
