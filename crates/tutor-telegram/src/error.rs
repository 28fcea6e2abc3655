//! Error types for the Telegram bot.

use thiserror::Error;

/// Errors that can occur in the Telegram bot.
#[derive(Debug, Error)]
pub enum BotError {
    /// Bot token not provided or invalid.
    #[error("Telegram bot token not set. Set TELEGRAM_BOT_TOKEN environment variable.")]
    NoToken,

    /// Failed to start the bot.
    #[error("Failed to start bot: {0}")]
    BotStartFailed(String),

    /// Invite code unknown or already used.
    #[error("Invalid invite code")]
    InvalidInviteCode,

    /// Invite code too old.
    #[error("Invite code expired")]
    InviteExpired,

    /// The command needs a registered user.
    #[error("You are not registered yet. Use /register <code> with the code from your instructor.")]
    NotAuthenticated,

    /// The command is reserved for instructors.
    #[error("This command is only available to instructors.")]
    NotAdmin,

    /// No lab group given and the caller has none.
    #[error("No lab group given. Usage: /{0} <group>")]
    NoGroup(&'static str),

    /// Upload exceeds the configured limit.
    #[error("File is too large ({size} bytes, limit {limit} bytes)")]
    UploadTooLarge { size: u64, limit: u64 },

    /// Downloading a file from Telegram failed.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Reply generation failed.
    #[error(transparent)]
    Agent(#[from] tutor_agent::AgentError),

    /// Ingestion or document search failed.
    #[error(transparent)]
    Memory(#[from] tutor_memory::MemoryError),

    /// Reading or writing stored records failed.
    #[error(transparent)]
    Persistence(#[from] tutor_persistence::PersistenceError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for bot operations.
pub type Result<T> = std::result::Result<T, BotError>;
