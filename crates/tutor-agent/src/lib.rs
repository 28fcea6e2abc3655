//! Prompt templates, intent classification and the conversation pipeline.
//!
//! Every free-text message goes through one classifier call that picks a
//! responder ([`ResponderKind`]). The responder decides the system prompt
//! and which history is injected; [`ConversationPipeline`] adds retrieval
//! context, calls the model and persists the exchange.
//!
//! # Core Types
//!
//! - [`ChatModel`]: the seam to the LLM; [`OpenRouterClient`] implements it over HTTP
//! - [`Intent`] / [`classify`]: General vs Guidance
//! - [`ConversationPipeline`]: messages, `/teach` and learning-style analysis
//! - [`ReportGenerator`]: rollcall, misconception and sitrep reports

pub mod client;
pub mod config;
pub mod error;
pub mod intent;
pub mod pipeline;
pub mod prompts;
pub mod reports;
pub mod responder;
pub mod retrieval;

#[cfg(test)]
mod test_support;

pub use client::{ChatModel, OpenRouterClient, PromptMessage, PromptRole};
pub use config::ModelConfig;
pub use error::{AgentError, Result};
pub use intent::{classify, Intent};
pub use pipeline::{build_messages, ConversationPipeline, PipelineReply, CACHE_MIN_RATIO};
pub use reports::{ReportGenerator, RollcallEntry, RollcallReport};
pub use responder::{HistoryPolicy, ResponderKind};
pub use retrieval::gather_context;
