//! The intent-routed conversation pipeline.
//!
//! A free-text message is classified, answered from the feedback cache when
//! possible, otherwise answered by the selected responder with retrieval
//! context and the recent conversation window. Both sides of the exchange
//! are appended to the user's current conversation and every reply gets a
//! feedback record that votes can attach to.

use std::sync::Arc;

use tracing::{info, warn};
use tutor_core::Settings;
use tutor_memory::{ChunkStore, EmbeddingGenerator};
use tutor_models::{ChatMessage, Conversation, FeedbackId, FeedbackRecord, User};
use tutor_persistence::Database;

use crate::client::{ChatModel, PromptMessage};
use crate::config::ModelConfig;
use crate::error::{AgentError, Result};
use crate::intent::{classify, Intent};
use crate::responder::ResponderKind;
use crate::retrieval::gather_context;

/// Minimum like ratio for a cached response to be reused.
pub const CACHE_MIN_RATIO: f64 = 0.5;

/// Most recent human messages considered for learning-style analysis.
const MAX_ANALYSED_MESSAGES: usize = 100;

/// A generated (or cached) reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReply {
    pub text: String,
    /// Classified intent; `None` for commands that bypass the classifier.
    pub intent: Option<Intent>,
    pub responder: ResponderKind,
    /// Record that 👍 / 👎 votes on this reply update.
    pub feedback_id: FeedbackId,
    /// True when the reply came from the feedback cache.
    pub cached: bool,
}

/// Routes user messages to responders and persists the exchange.
pub struct ConversationPipeline {
    db: Arc<Database>,
    model: Arc<dyn ChatModel>,
    config: ModelConfig,
    store: Arc<dyn ChunkStore>,
    embedder: EmbeddingGenerator,
    history_window: usize,
    retrieval_k: usize,
}

impl ConversationPipeline {
    pub fn new(
        db: Arc<Database>,
        model: Arc<dyn ChatModel>,
        store: Arc<dyn ChunkStore>,
        embedder: EmbeddingGenerator,
        settings: &Settings,
    ) -> Self {
        Self {
            db,
            model,
            config: ModelConfig::default(),
            store,
            embedder,
            history_window: settings.history_window,
            retrieval_k: settings.retrieval_k,
        }
    }

    pub fn with_model_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.config
    }

    /// Answer a free-text message.
    pub async fn handle_message(&self, user: &User, text: &str) -> Result<PipelineReply> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AgentError::InvalidInput("message is empty".into()));
        }

        let intent = classify(self.model.as_ref(), &self.config, text).await;
        let conversation = self.db.chats().current(user.id, user.conversation_id)?;

        if intent == Intent::General && conversation.is_empty() {
            if let Some(cached) = self.reusable_response(text)? {
                let chats = self.db.chats();
                chats.append(user.id, conversation.id, ChatMessage::human(text))?;
                chats.append(user.id, conversation.id, ChatMessage::ai(&cached.response))?;
                info!(
                    user_id = %user.id,
                    feedback_id = %cached.id,
                    ratio = cached.ratio(),
                    "Reused cached response"
                );
                return Ok(PipelineReply {
                    text: cached.response,
                    intent: Some(intent),
                    responder: ResponderKind::General,
                    feedback_id: cached.id,
                    cached: true,
                });
            }
        }

        self.respond(user, ResponderKind::from(intent), Some(intent), text, &conversation)
            .await
    }

    /// Give a short lesson on `topic`, recorded in the current conversation.
    pub async fn teach(&self, user: &User, topic: &str) -> Result<PipelineReply> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(AgentError::InvalidInput("no topic given".into()));
        }

        let conversation = self.db.chats().current(user.id, user.conversation_id)?;
        let request = format!("Teach me about {}", topic);
        self.respond(user, ResponderKind::Teaching, None, &request, &conversation)
            .await
    }

    /// Describe the user's learning style from everything they have asked.
    pub async fn learning_style(&self, user: &User) -> Result<String> {
        let messages = self.db.chats().human_messages(user.id)?;
        if messages.is_empty() {
            return Err(AgentError::NoHistory(user.display_name()));
        }

        let recent = &messages[messages.len().saturating_sub(MAX_ANALYSED_MESSAGES)..];
        let transcript = recent
            .iter()
            .map(|m| format!("- {}", m.text.trim()))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = [
            PromptMessage::system(ResponderKind::LearningStyle.system_prompt()),
            PromptMessage::user(transcript),
        ];
        let analysis = self.model.reply(&prompt, &self.config).await?;
        info!(user_id = %user.id, messages = recent.len(), "Learning style analysed");
        Ok(analysis)
    }

    /// Best cached response for this prompt, if it is rated well enough.
    fn reusable_response(&self, text: &str) -> Result<Option<FeedbackRecord>> {
        Ok(self
            .db
            .feedback()
            .find_cached(text)?
            .filter(|r| r.likes >= 1 && r.ratio() >= CACHE_MIN_RATIO))
    }

    async fn respond(
        &self,
        user: &User,
        kind: ResponderKind,
        intent: Option<Intent>,
        text: &str,
        conversation: &Conversation,
    ) -> Result<PipelineReply> {
        let context = if kind.uses_retrieval() {
            self.context_for(user, text).await
        } else {
            String::new()
        };
        let messages = build_messages(
            kind.system_prompt(),
            &context,
            conversation.window(self.history_window),
            text,
        );

        // The question is kept even if generation fails below.
        let chats = self.db.chats();
        chats.append(user.id, conversation.id, ChatMessage::human(text))?;

        let reply = self.model.reply(&messages, &self.config).await?;
        chats.append(user.id, conversation.id, ChatMessage::ai(&reply))?;

        let record = FeedbackRecord::new(text, &reply);
        self.db.feedback().insert(&record)?;

        info!(
            user_id = %user.id,
            conversation = conversation.id,
            responder = %kind,
            context = !context.is_empty(),
            "Reply generated"
        );
        Ok(PipelineReply {
            text: reply,
            intent,
            responder: kind,
            feedback_id: record.id,
            cached: false,
        })
    }

    /// Retrieval context, or nothing if the search fails.
    async fn context_for(&self, user: &User, query: &str) -> String {
        match gather_context(
            self.store.as_ref(),
            &self.embedder,
            user.id,
            query,
            self.retrieval_k,
        )
        .await
        {
            Ok(context) => context,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Retrieval failed, answering without context");
                String::new()
            }
        }
    }
}

/// System prompt, optional context, history window, then the new message.
pub fn build_messages(
    system_prompt: &str,
    context: &str,
    history: &[ChatMessage],
    text: &str,
) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(PromptMessage::system(system_prompt));
    if !context.is_empty() {
        messages.push(PromptMessage::system(context));
    }
    messages.extend(history.iter().map(PromptMessage::from_history));
    messages.push(PromptMessage::user(text));
    messages
}
