//! Conversations and their append-only message history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::UserId;

/// Per-user conversation counter, starting at 1.
pub type ConversationId = u32;

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Human,
    Ai,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Ai => write!(f, "ai"),
        }
    }
}

/// A single message. Never modified once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a message with the current timestamp.
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// A message written by the user.
    pub fn human(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, text)
    }

    /// A message written by the bot.
    pub fn ai(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Ai, text)
    }

    pub fn is_human(&self) -> bool {
        self.role == MessageRole::Human
    }
}

/// An ordered chat session owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub user_id: UserId,
    pub id: ConversationId,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub started_at: DateTime<Utc>,
}

impl Conversation {
    /// Creates an empty conversation.
    pub fn new(user_id: UserId, id: ConversationId) -> Self {
        Self {
            user_id,
            id,
            messages: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Appends a message to the end of the history.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// The last `n` messages, oldest first.
    pub fn window(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Timestamp of the newest message, if any.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.timestamp)
    }
}
