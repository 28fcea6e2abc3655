//! Chat completions over OpenRouter.
//!
//! Every generator in this crate talks to the model through the [`ChatModel`]
//! trait; [`OpenRouterClient`] is the HTTP implementation used by the bot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::ModelConfig;
use crate::error::{AgentError, Result};

/// Environment variable for OpenRouter API key.
pub const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Environment variable overriding the API base URL (any OpenAI-compatible server).
pub const OPENROUTER_BASE_URL_ENV: &str = "OPENROUTER_BASE_URL";

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Something that turns a prompt into a reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion and return the reply text.
    async fn complete(&self, messages: &[PromptMessage], config: &ModelConfig) -> Result<String>;

    /// Like [`complete`](Self::complete), trimmed. A blank reply is
    /// [`AgentError::EmptyReply`], so nothing empty reaches the chat.
    async fn reply(&self, messages: &[PromptMessage], config: &ModelConfig) -> Result<String> {
        let text = self.complete(messages, config).await?;
        match text.trim() {
            "" => Err(AgentError::EmptyReply),
            trimmed => Ok(trimmed.to_string()),
        }
    }
}

/// Speaker of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl PromptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    fn with_role(role: PromptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(PromptRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(PromptRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(PromptRole::Assistant, content)
    }

    /// Replay a stored history message: the student speaks as `user`,
    /// the bot as `assistant`.
    pub fn from_history(message: &tutor_models::ChatMessage) -> Self {
        let role = if message.is_human() {
            PromptRole::User
        } else {
            PromptRole::Assistant
        };
        Self::with_role(role, message.text.as_str())
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    total_tokens: u32,
}

impl CompletionResponse {
    /// Trimmed text of the first choice, if it has any.
    fn reply(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// HTTP client for an OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create a client from `OPENROUTER_API_KEY` (and `OPENROUTER_BASE_URL`).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(OPENROUTER_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AgentError::Configuration(format!(
                    "Missing {} environment variable",
                    OPENROUTER_API_KEY_ENV
                ))
            })?;

        let client = Self::new(api_key);
        Ok(match std::env::var(OPENROUTER_BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => client.with_base_url(url),
            _ => client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatModel for OpenRouterClient {
    async fn complete(&self, messages: &[PromptMessage], config: &ModelConfig) -> Result<String> {
        let request = CompletionRequest {
            model: &config.model,
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };
        trace!(model = %config.model, messages = messages.len(), "Sending chat request");

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .header("X-Title", "Tutorbot")
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::ModelInvocation(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::ModelInvocation(format!("Reading response failed: {}", e)))?;
        if !status.is_success() {
            return Err(AgentError::ModelInvocation(format!(
                "Chat API error {}: {}",
                status, body
            )));
        }

        let parsed: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| AgentError::ResponseParse(format!("Failed to parse response: {}", e)))?;
        debug!(
            model = %config.model,
            tokens = parsed.usage.as_ref().map_or(0, |u| u.total_tokens),
            "Chat response received"
        );

        parsed.reply().ok_or(AgentError::EmptyReply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_history() {
        let human = tutor_models::ChatMessage::human("why?");
        let ai = tutor_models::ChatMessage::ai("because");
        assert_eq!(PromptMessage::from_history(&human), PromptMessage::user("why?"));
        assert_eq!(PromptMessage::from_history(&ai), PromptMessage::assistant("because"));
    }

    #[test]
    fn test_request_serialization() {
        let messages = [PromptMessage::system("Be brief"), PromptMessage::user("Hello")];
        let request = CompletionRequest {
            model: "openai/gpt-4o-mini",
            messages: &messages,
            max_tokens: 8,
            temperature: 0.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["max_tokens"], 8);
    }

    #[test]
    fn test_reply_is_trimmed() {
        let response: CompletionResponse = serde_json::from_value(json!({
            "id": "gen-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "  Guidance \n"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 1, "total_tokens": 11}
        }))
        .unwrap();
        assert_eq!(response.usage.as_ref().map(|u| u.total_tokens), Some(11));
        assert_eq!(response.reply().as_deref(), Some("Guidance"));
    }

    #[test]
    fn test_blank_reply_is_none() {
        let null: CompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        }))
        .unwrap();
        assert!(null.reply().is_none());

        let blank: CompletionResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": "  "}}]})).unwrap();
        assert!(blank.reply().is_none());

        let empty: CompletionResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.reply().is_none());
    }

    #[test]
    fn test_base_url_override() {
        let client = OpenRouterClient::new("k").with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.completions_url(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(
            OpenRouterClient::new("k").completions_url(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }
}
