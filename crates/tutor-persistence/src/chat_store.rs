//! Conversation history store.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;
use tutor_models::{ChatMessage, Conversation, ConversationId, UserId};

use crate::atomic::{atomic_write_json, load_all_json, read_json_optional};
use crate::error::Result;

/// Stores each conversation as one JSON document:
/// ```text
/// base_path/
/// └── history/
///     └── {user_id}/
///         ├── 1.json
///         └── 2.json
/// ```
///
/// Messages are only ever appended.
pub struct ChatStore {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl ChatStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn user_dir(&self, user_id: UserId) -> PathBuf {
        self.base_path.join("history").join(user_id.to_string())
    }

    fn conversation_path(&self, user_id: UserId, id: ConversationId) -> PathBuf {
        self.user_dir(user_id).join(format!("{}.json", id))
    }

    /// Load a conversation, or an empty one if nothing was written yet.
    pub fn current(&self, user_id: UserId, id: ConversationId) -> Result<Conversation> {
        Ok(read_json_optional(&self.conversation_path(user_id, id))?
            .unwrap_or_else(|| Conversation::new(user_id, id)))
    }

    /// Append a message to a conversation, creating it if needed.
    pub fn append(&self, user_id: UserId, id: ConversationId, message: ChatMessage) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut conversation = self.current(user_id, id)?;
        debug!(user_id = %user_id, conversation = id, role = %message.role, "Appending message");
        conversation.append(message);
        atomic_write_json(&self.conversation_path(user_id, id), &conversation)
    }

    /// All conversations of a user, oldest first.
    pub fn list_conversations(&self, user_id: UserId) -> Result<Vec<Conversation>> {
        let mut conversations: Vec<Conversation> = load_all_json(&self.user_dir(user_id))?;
        conversations.sort_by_key(|c| c.id);
        Ok(conversations)
    }

    /// Every human message the user wrote, across conversations, oldest first.
    pub fn human_messages(&self, user_id: UserId) -> Result<Vec<ChatMessage>> {
        let mut messages: Vec<ChatMessage> = self
            .list_conversations(user_id)?
            .into_iter()
            .flat_map(|c| c.messages)
            .filter(ChatMessage::is_human)
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    /// Human messages written by any of `user_ids` after `since`, oldest first.
    pub fn recent_human_messages(
        &self,
        user_ids: &[UserId],
        since: DateTime<Utc>,
    ) -> Result<Vec<(UserId, ChatMessage)>> {
        let mut recent = Vec::new();
        for &user_id in user_ids {
            for message in self.human_messages(user_id)? {
                if message.timestamp >= since {
                    recent.push((user_id, message));
                }
            }
        }
        recent.sort_by_key(|(_, m)| m.timestamp);
        Ok(recent)
    }

    /// Timestamp of the user's newest message in any conversation.
    pub fn last_activity(&self, user_id: UserId) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .list_conversations(user_id)?
            .iter()
            .filter_map(Conversation::last_activity)
            .max())
    }
}
