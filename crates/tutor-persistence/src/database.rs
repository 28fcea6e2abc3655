//! Database facade over the user, chat and feedback stores.

use std::path::{Path, PathBuf};

use tracing::info;
use tutor_models::{ConversationId, UserId};

use crate::chat_store::ChatStore;
use crate::error::Result;
use crate::feedback_store::FeedbackStore;
use crate::user_store::UserStore;

/// All document stores rooted at one directory.
pub struct Database {
    root: PathBuf,
    users: UserStore,
    chats: ChatStore,
    feedback: FeedbackStore,
}

impl Database {
    /// Open (or lazily create) the stores under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!(path = %root.display(), "Opening database");
        Self {
            users: UserStore::new(&root),
            chats: ChatStore::new(&root),
            feedback: FeedbackStore::new(&root),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn chats(&self) -> &ChatStore {
        &self.chats
    }

    pub fn feedback(&self) -> &FeedbackStore {
        &self.feedback
    }

    /// Start a new conversation for the user and return its id.
    pub fn advance_conversation(&self, user_id: UserId) -> Result<ConversationId> {
        let mut user = self.users.require(user_id)?;
        user.conversation_id += 1;
        self.users.upsert(&user)?;
        info!(user_id = %user_id, conversation = user.conversation_id, "Started new conversation");
        Ok(user.conversation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use tempfile::tempdir;
    use tutor_models::{ChatMessage, User};

    #[test]
    fn test_advance_conversation_increments() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path());
        db.users().upsert(&User::new(5, None)).unwrap();

        assert_eq!(db.advance_conversation(UserId(5)).unwrap(), 2);
        assert_eq!(db.advance_conversation(UserId(5)).unwrap(), 3);
        assert_eq!(db.users().require(UserId(5)).unwrap().conversation_id, 3);
    }

    #[test]
    fn test_advance_conversation_unknown_user() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path());
        assert!(matches!(
            db.advance_conversation(UserId(1)),
            Err(PersistenceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_new_conversation_starts_empty() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path());
        db.users().upsert(&User::new(1, None)).unwrap();
        db.chats().append(UserId(1), 1, ChatMessage::human("before")).unwrap();

        let next = db.advance_conversation(UserId(1)).unwrap();
        assert!(db.chats().current(UserId(1), next).unwrap().is_empty());
        assert_eq!(db.chats().current(UserId(1), 1).unwrap().len(), 1);
    }
}
