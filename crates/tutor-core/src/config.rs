//! Shared configuration paths for Tutorbot.
//!
//! All application data is stored under `~/.tutorbot/`:
//!
//! ```text
//! ~/.tutorbot/
//! ├── db/             # Document stores
//! │   ├── users/      # One JSON file per user
//! │   ├── history/    # Conversations, one directory per user
//! │   ├── feedback/   # Cached prompt/response pairs with votes
//! │   └── documents/  # Embedded document chunks
//! ├── config/         # .env.local with tokens and API keys
//! └── invites.json    # Outstanding registration codes
//! ```
//!
//! # Environment Variables
//!
//! - `TUTORBOT_STATE_DIR`: Override the base state directory
//! - `TUTORBOT_DB_DIR`: Override the database directory
//! - `TUTORBOT_CONFIG_DIR`: Override the config directory

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::debug;

/// Environment variable for custom state directory.
pub const STATE_DIR_ENV: &str = "TUTORBOT_STATE_DIR";

/// Environment variable for custom database directory.
pub const DB_DIR_ENV: &str = "TUTORBOT_DB_DIR";

/// Environment variable for custom config directory.
pub const CONFIG_DIR_ENV: &str = "TUTORBOT_CONFIG_DIR";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".tutorbot";

const DB_SUBDIR: &str = "db";
const CONFIG_SUBDIR: &str = "config";

static STATE_DIR_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Get the Tutorbot state directory.
///
/// The state directory is determined by:
/// 1. `TUTORBOT_STATE_DIR` environment variable if set
/// 2. `~/.tutorbot` if home directory is available
/// 3. `.tutorbot` in current directory as fallback
pub fn state_dir() -> PathBuf {
    STATE_DIR_CACHE
        .get_or_init(|| {
            std::env::var(STATE_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    dirs::home_dir()
                        .map(|h| h.join(DEFAULT_STATE_DIR))
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
                })
        })
        .clone()
}

/// Get the database directory.
///
/// Defaults to `~/.tutorbot/db/` or `TUTORBOT_DB_DIR` env var.
pub fn db_dir() -> PathBuf {
    std::env::var(DB_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(DB_SUBDIR))
}

/// Directory holding one JSON document per user.
pub fn users_dir() -> PathBuf {
    db_dir().join("users")
}

/// Directory holding conversation history.
pub fn history_dir() -> PathBuf {
    db_dir().join("history")
}

/// Directory holding feedback records.
pub fn feedback_dir() -> PathBuf {
    db_dir().join("feedback")
}

/// Directory holding embedded document chunks.
pub fn documents_dir() -> PathBuf {
    db_dir().join("documents")
}

/// Get the user config directory.
///
/// Defaults to `~/.tutorbot/config/` or `TUTORBOT_CONFIG_DIR` env var.
pub fn config_dir() -> PathBuf {
    std::env::var(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(CONFIG_SUBDIR))
}

/// Get the .env.local file path (bot token, API keys).
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Get the invite codes file path.
pub fn invites_file() -> PathBuf {
    state_dir().join("invites.json")
}

/// Load environment variables from the config directory, then from a local
/// `.env.local` or `.env`. Variables already set in the process win.
pub fn load_env() {
    let env_path = env_file();
    if env_path.exists() {
        if let Err(e) = dotenvy::from_path(&env_path) {
            debug!(error = %e, path = %env_path.display(), "Could not load env file");
        }
    }
    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());
}

/// Ensure the state directory and all subdirectories exist.
///
/// # Errors
/// Returns an error if any directory cannot be created.
pub fn ensure_all_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(users_dir())?;
    std::fs::create_dir_all(history_dir())?;
    std::fs::create_dir_all(feedback_dir())?;
    std::fs::create_dir_all(documents_dir())?;
    std::fs::create_dir_all(config_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables can't be isolated across parallel tests, so
    // these check path construction by the trailing names only.

    #[test]
    fn test_state_dir_uses_default_name() {
        let dir = state_dir();
        assert!(dir.is_absolute() || dir.ends_with(".tutorbot"));
    }

    #[test]
    fn test_store_dirs_live_under_db() {
        assert!(users_dir().ends_with("db/users") || users_dir().ends_with("users"));
        assert!(history_dir().ends_with("history"));
        assert!(feedback_dir().ends_with("feedback"));
        assert!(documents_dir().ends_with("documents"));
    }

    #[test]
    fn test_env_file_name() {
        assert!(env_file().ends_with(".env.local"));
    }

    #[test]
    fn test_invites_file_name() {
        assert!(invites_file().ends_with("invites.json"));
    }
}
