//! One-time invite codes for registering students and instructors.
//!
//! An instructor creates a code for a lab group with `/invite`; the student
//! redeems it once with `/register`. Pending codes live in memory and are
//! mirrored to `invites.json` so they survive restarts.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use tutor_models::{Role, UserId};
use tutor_persistence::atomic::{atomic_write_json, read_json_optional};

use crate::error::{BotError, Result};

/// Length of an invite code.
pub const CODE_LEN: usize = 6;

/// Character set for codes (no ambiguous characters: I, O, 0, 1).
const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789"; // pragma: allowlist secret

/// A pending invite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    pub lab_group: String,
    pub role: Role,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Invite {
    pub fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now() - self.created_at > ttl
    }
}

/// Generate a random code from the unambiguous charset.
pub fn generate_code() -> String {
    uuid::Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(CODE_LEN)
        .map(|b| CHARSET[*b as usize % CHARSET.len()] as char)
        .collect()
}

/// Normalise user input: trimmed, upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Pending invite codes.
pub struct InviteBook {
    path: PathBuf,
    ttl: Duration,
    invites: RwLock<HashMap<String, Invite>>,
}

impl InviteBook {
    /// Load pending invites from `path` (missing or unreadable file = none).
    pub fn open(path: impl Into<PathBuf>, ttl_secs: u64) -> Self {
        let path = path.into();
        let invites = match read_json_optional::<HashMap<String, Invite>>(&path) {
            Ok(Some(invites)) => {
                info!(count = invites.len(), "Loaded pending invites from disk");
                invites
            }
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to read invites file");
                HashMap::new()
            }
        };

        Self {
            path,
            ttl: Duration::seconds(ttl_secs.min(u64::from(u32::MAX)) as i64),
            invites: RwLock::new(invites),
        }
    }

    fn save(&self, invites: &HashMap<String, Invite>) -> Result<()> {
        atomic_write_json(&self.path, invites)?;
        debug!(count = invites.len(), path = %self.path.display(), "Saved invites file");
        Ok(())
    }

    /// Create a code for `lab_group` and persist it.
    pub async fn create(&self, lab_group: &str, role: Role, created_by: UserId) -> Result<String> {
        let mut invites = self.invites.write().await;
        let ttl = self.ttl;
        invites.retain(|_, i| !i.is_expired(ttl));

        let mut code = generate_code();
        while invites.contains_key(&code) {
            code = generate_code();
        }

        invites.insert(
            code.clone(),
            Invite {
                lab_group: lab_group.trim().to_string(),
                role,
                created_by,
                created_at: Utc::now(),
            },
        );
        self.save(&invites)?;

        info!(group = %lab_group, role = %role, created_by = %created_by, "Created invite");
        Ok(code)
    }

    /// Redeem a code. Each code works once.
    pub async fn consume(&self, code: &str) -> Result<Invite> {
        let code = normalize_code(code);
        let mut invites = self.invites.write().await;

        let invite = invites.remove(&code);
        let ttl = self.ttl;
        invites.retain(|_, i| !i.is_expired(ttl));
        self.save(&invites)?;

        match invite {
            None => Err(BotError::InvalidInviteCode),
            Some(invite) if invite.is_expired(ttl) => Err(BotError::InviteExpired),
            Some(invite) => {
                debug!(group = %invite.lab_group, "Consumed invite");
                Ok(invite)
            }
        }
    }

    /// Put back a consumed code whose registration could not be completed.
    pub async fn restore(&self, code: &str, invite: Invite) -> Result<()> {
        let mut invites = self.invites.write().await;
        invites.insert(normalize_code(code), invite);
        self.save(&invites)?;
        debug!("Restored invite");
        Ok(())
    }

    /// Number of codes that are still redeemable.
    pub async fn pending(&self) -> usize {
        let ttl = self.ttl;
        self.invites
            .read()
            .await
            .values()
            .filter(|i| !i.is_expired(ttl))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_code() {
        let code = generate_code();
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|c| CHARSET.contains(&c)));
    }

    #[test]
    fn test_invite_expiry() {
        let mut invite = Invite {
            lab_group: "lab1".into(),
            role: Role::Student,
            created_by: UserId(1),
            created_at: Utc::now(),
        };
        assert!(!invite.is_expired(Duration::minutes(5)));

        invite.created_at = Utc::now() - Duration::minutes(6);
        assert!(invite.is_expired(Duration::minutes(5)));
    }

    #[tokio::test]
    async fn test_create_and_consume_once() {
        let dir = TempDir::new().unwrap();
        let book = InviteBook::open(dir.path().join("invites.json"), 3600);

        let code = book.create("lab1", Role::Student, UserId(9)).await.unwrap();
        assert_eq!(book.pending().await, 1);

        let invite = book.consume(&code.to_lowercase()).await.unwrap();
        assert_eq!(invite.lab_group, "lab1");
        assert_eq!(invite.role, Role::Student);

        assert!(matches!(
            book.consume(&code).await,
            Err(BotError::InvalidInviteCode)
        ));
    }

    #[tokio::test]
    async fn test_restore_makes_code_redeemable_again() {
        let dir = TempDir::new().unwrap();
        let book = InviteBook::open(dir.path().join("invites.json"), 3600);
        let code = book.create("lab1", Role::Student, UserId(1)).await.unwrap();

        let invite = book.consume(&code).await.unwrap();
        assert_eq!(book.pending().await, 0);
        book.restore(&code.to_lowercase(), invite.clone()).await.unwrap();

        let reopened = InviteBook::open(dir.path().join("invites.json"), 3600);
        assert_eq!(reopened.consume(&code).await.unwrap(), invite);
    }

    #[tokio::test]
    async fn test_invites_survive_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("invites.json");

        let code = {
            let book = InviteBook::open(&path, 3600);
            book.create("lab2", Role::Admin, UserId(1)).await.unwrap()
        };

        let book = InviteBook::open(&path, 3600);
        let invite = book.consume(&code).await.unwrap();
        assert_eq!(invite.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("invites.json");

        let mut stale = HashMap::new();
        stale.insert(
            "ABC234".to_string(),
            Invite {
                lab_group: "lab1".into(),
                role: Role::Student,
                created_by: UserId(1),
                created_at: Utc::now() - Duration::hours(2),
            },
        );
        atomic_write_json(&path, &stale).unwrap();

        let book = InviteBook::open(&path, 3600);
        assert_eq!(book.pending().await, 0);
        assert!(matches!(
            book.consume("abc234").await,
            Err(BotError::InviteExpired)
        ));
    }
}
