//! Runtime tunables read from the environment.

use std::str::FromStr;

use tracing::warn;

/// Messages of the current conversation injected into a prompt.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Chunks retrieved per collection (user and global).
pub const DEFAULT_RETRIEVAL_K: usize = 4;

/// Chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Invite code lifetime (one day).
pub const DEFAULT_INVITE_TTL_SECS: u64 = 86_400;

/// Look-back window for rollcall, misconception and sitrep reports.
pub const DEFAULT_REPORT_DAYS: i64 = 7;

/// Telegram bots cannot download files larger than 20 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Bot-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub history_window: usize,
    pub retrieval_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Telegram handles (lowercase, without `@`) promoted to admin on first contact.
    pub admin_handles: Vec<String>,
    pub invite_ttl_secs: u64,
    pub report_days: i64,
    pub max_upload_bytes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            retrieval_k: DEFAULT_RETRIEVAL_K,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            admin_handles: Vec::new(),
            invite_ttl_secs: DEFAULT_INVITE_TTL_SECS,
            report_days: DEFAULT_REPORT_DAYS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Settings {
    /// Read settings from `TUTORBOT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut settings = Self {
            history_window: parse_or(&lookup, "TUTORBOT_HISTORY_WINDOW", defaults.history_window),
            retrieval_k: parse_or(&lookup, "TUTORBOT_RETRIEVAL_K", defaults.retrieval_k),
            chunk_size: parse_or(&lookup, "TUTORBOT_CHUNK_SIZE", defaults.chunk_size),
            chunk_overlap: parse_or(&lookup, "TUTORBOT_CHUNK_OVERLAP", defaults.chunk_overlap),
            admin_handles: lookup("TUTORBOT_ADMIN_HANDLES")
                .map(|raw| parse_handles(&raw))
                .unwrap_or_default(),
            invite_ttl_secs: parse_or(&lookup, "TUTORBOT_INVITE_TTL_SECS", defaults.invite_ttl_secs),
            report_days: parse_or(&lookup, "TUTORBOT_REPORT_DAYS", defaults.report_days),
            max_upload_bytes: parse_or(&lookup, "TUTORBOT_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        };

        if settings.chunk_overlap >= settings.chunk_size {
            warn!(
                chunk_size = settings.chunk_size,
                chunk_overlap = settings.chunk_overlap,
                "Chunk overlap must be smaller than chunk size, using defaults"
            );
            settings.chunk_size = DEFAULT_CHUNK_SIZE;
            settings.chunk_overlap = DEFAULT_CHUNK_OVERLAP;
        }

        settings
    }

    /// Whether a Telegram handle is configured as an admin.
    pub fn is_admin_handle(&self, handle: &str) -> bool {
        let handle = normalize_handle(handle);
        self.admin_handles.iter().any(|h| *h == handle)
    }
}

/// Lowercase a Telegram handle and strip a leading `@`.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

fn parse_handles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(normalize_handle)
        .filter(|h| !h.is_empty())
        .collect()
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = key, value = %raw, "Invalid setting, using default");
            default
        }),
        None => default,
    }
}
