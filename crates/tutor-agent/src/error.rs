//! Error types for the agent crate.

use thiserror::Error;

/// Errors that can occur while generating replies and reports.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Model invocation failed.
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    /// Response parsing failed.
    #[error("failed to parse response: {0}")]
    ResponseParse(String),

    /// The model answered with no text.
    #[error("model returned an empty reply")]
    EmptyReply,

    /// Document retrieval or embedding failed.
    #[error("memory operation failed: {0}")]
    Memory(#[from] tutor_memory::MemoryError),

    /// Reading or writing history, users or feedback failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] tutor_persistence::PersistenceError),

    /// The user has not written anything that could be analysed.
    #[error("no messages from {0} yet")]
    NoHistory(String),

    /// The request was missing required input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
