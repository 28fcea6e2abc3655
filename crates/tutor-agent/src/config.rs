//! Model configuration for chat completions.

use serde::{Deserialize, Serialize};

/// Environment variable selecting the chat model.
pub const OPENROUTER_MODEL_ENV: &str = "OPENROUTER_MODEL";

/// Model used when `OPENROUTER_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Model configuration for one kind of request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier (e.g., "openai/gpt-4o-mini", "anthropic/claude-sonnet-4").
    pub model: String,

    /// Maximum tokens to generate in responses.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for response generation (0.0 to 2.0).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }

    /// Read the model from `OPENROUTER_MODEL`, falling back to the default.
    pub fn from_env() -> Self {
        std::env::var(OPENROUTER_MODEL_ENV)
            .ok()
            .filter(|m| !m.trim().is_empty())
            .map(|m| Self::new(m.trim()))
            .unwrap_or_default()
    }

    /// Deterministic, short-output variant for classification calls.
    pub fn for_classifier(&self) -> Self {
        self.clone().with_temperature(0.0).with_max_tokens(8)
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_default() {
        let config = ModelConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.temperature, 0.7);
    }

    #[test]
    fn test_classifier_variant() {
        let config = ModelConfig::new("m").for_classifier();
        assert_eq!(config.model, "m");
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.max_tokens, 8);
    }

    #[test]
    fn test_temperature_clamping() {
        assert_eq!(ModelConfig::default().with_temperature(5.0).temperature, 2.0);
        assert_eq!(ModelConfig::default().with_temperature(-1.0).temperature, 0.0);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ModelConfig = serde_json::from_str(r#"{"model":"x"}"#).unwrap();
        assert_eq!(config, ModelConfig::new("x"));
    }
}
