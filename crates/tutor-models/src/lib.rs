//! Core data models for Tutorbot.
//!
//! Users, conversations with their append-only message history, and the
//! feedback records attached to generated responses.

pub mod conversation;
pub mod feedback;
pub mod ids;
pub mod user;

pub use conversation::{ChatMessage, Conversation, ConversationId, MessageRole};
pub use feedback::{normalize_prompt, FeedbackRecord, Vote, VoteOutcome};
pub use ids::{ChunkId, FeedbackId};
pub use user::{Role, User, UserId};
