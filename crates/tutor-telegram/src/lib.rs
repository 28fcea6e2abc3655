//! Telegram bot interface for Tutorbot.
//!
//! Students register with an invite code, then chat in plain text. Every
//! reply comes from the conversation pipeline in `tutor-agent` and carries
//! 👍 / 👎 buttons; well-rated answers are reused for repeat questions.
//! Uploaded documents are indexed for retrieval.
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`: Bot token from @BotFather
//! - `OPENROUTER_API_KEY`: Chat completions
//!
//! Optional:
//! - `OPENROUTER_MODEL`: Model to use (default: openai/gpt-4o-mini)
//! - `OPENAI_API_KEY`: Embeddings for document search
//! - `TUTORBOT_ADMIN_HANDLES`: Comma-separated Telegram handles promoted to instructor
//! - `TUTORBOT_STATE_DIR`: State directory (default: ~/.tutorbot)
//!
//! # Commands
//!
//! - `/register <code>` - Join a lab group
//! - `/newchat`, `/history` - Manage conversations
//! - `/teach <topic>`, `/style` - Lessons and learning-style analysis
//! - `/docs`, `/cleardocs` - Uploaded documents
//! - `/invite`, `/rollcall`, `/misconceptions`, `/sitrep`, `/clearglobal` - Instructors

pub mod bot;
pub mod error;
pub mod handlers;
pub mod invites;
pub mod state;

pub use bot::TutorBot;
pub use error::{BotError, Result};
pub use handlers::Command;
pub use invites::{generate_code, Invite, InviteBook};
pub use state::{BotState, DocumentListing, GroupReport};
