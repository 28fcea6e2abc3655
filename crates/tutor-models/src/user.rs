//! User records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::conversation::ConversationId;

/// Telegram user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Learner; can chat, upload documents and ask for analysis of their own history.
    #[default]
    Student,
    /// Teacher; can issue invites, pull group reports and manage the global corpus.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// A bot user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,

    /// Telegram handle without the leading `@`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,

    /// Whether the user has registered with a valid invite.
    pub authenticated: bool,

    #[serde(default)]
    pub role: Role,

    /// Lab group tag used to scope reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lab_group: Option<String>,

    /// Conversation new messages are appended to.
    #[serde(default = "first_conversation")]
    pub conversation_id: ConversationId,

    pub created_at: DateTime<Utc>,

    pub last_seen: DateTime<Utc>,
}

fn first_conversation() -> ConversationId {
    1
}

impl User {
    /// Creates an unauthenticated user at conversation 1.
    pub fn new(id: impl Into<UserId>, handle: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            handle: handle.map(|h| h.trim_start_matches('@').to_string()),
            authenticated: false,
            role: Role::Student,
            lab_group: None,
            conversation_id: first_conversation(),
            created_at: now,
            last_seen: now,
        }
    }

    /// Marks the user authenticated with the given role and lab group.
    pub fn authenticate(&mut self, role: Role, lab_group: Option<String>) {
        self.authenticated = true;
        self.role = role;
        if lab_group.is_some() {
            self.lab_group = lab_group;
        }
    }

    /// Whether the user is an authenticated admin.
    pub fn is_admin(&self) -> bool {
        self.authenticated && self.role == Role::Admin
    }

    /// `@handle` if known, otherwise the numeric id.
    pub fn display_name(&self) -> String {
        match &self.handle {
            Some(handle) => format!("@{}", handle),
            None => format!("user {}", self.id),
        }
    }

    /// Whether the user belongs to the given lab group (case-insensitive).
    pub fn in_group(&self, group: &str) -> bool {
        self.lab_group
            .as_deref()
            .is_some_and(|g| g.eq_ignore_ascii_case(group))
    }
}
