//! Persistence layer for Tutorbot.
//!
//! Users, conversation history and response feedback are stored as JSON
//! documents using atomic file operations (write to temp file, then rename).
//!
//! # Example
//!
//! ```no_run
//! use tutor_persistence::Database;
//! use tutor_models::{ChatMessage, User, UserId};
//!
//! let db = Database::open("/home/user/.tutorbot/db");
//! db.users().upsert(&User::new(42, Some("alice".into()))).unwrap();
//! db.chats().append(UserId(42), 1, ChatMessage::human("What is entropy?")).unwrap();
//! ```

pub mod atomic;
pub mod chat_store;
pub mod database;
pub mod error;
pub mod feedback_store;
pub mod user_store;

pub use chat_store::ChatStore;
pub use database::Database;
pub use error::{PersistenceError, Result};
pub use feedback_store::FeedbackStore;
pub use user_store::UserStore;
