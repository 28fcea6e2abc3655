//! Intent classification with a single model call.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::{ChatModel, PromptMessage};
use crate::config::ModelConfig;
use crate::prompts::CLASSIFIER_PROMPT;

/// What a free-text message is asking for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    #[default]
    General,
    Guidance,
}

impl Intent {
    /// Find the first label in a model reply, ignoring case and surrounding text.
    pub fn parse(reply: &str) -> Option<Self> {
        static LABEL: OnceLock<Regex> = OnceLock::new();
        let label = LABEL.get_or_init(|| {
            Regex::new(r"(?i)\b(general|guidance)\b").expect("intent label pattern is valid")
        });

        label
            .captures(reply)
            .and_then(|c| c.get(1))
            .map(|m| match m.as_str().to_ascii_lowercase().as_str() {
                "guidance" => Self::Guidance,
                _ => Self::General,
            })
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => write!(f, "General"),
            Self::Guidance => write!(f, "Guidance"),
        }
    }
}

/// Classify a message. Never fails: transport errors and unreadable replies
/// fall back to [`Intent::General`].
pub async fn classify(model: &dyn ChatModel, config: &ModelConfig, text: &str) -> Intent {
    let messages = [
        PromptMessage::system(CLASSIFIER_PROMPT),
        PromptMessage::user(text),
    ];

    match model.complete(&messages, &config.for_classifier()).await {
        Ok(reply) => match Intent::parse(&reply) {
            Some(intent) => {
                debug!(intent = %intent, "Classified message");
                intent
            }
            None => {
                warn!(reply = %reply, "Unrecognised classifier reply, using General");
                Intent::General
            }
        },
        Err(e) => {
            warn!(error = %e, "Intent classification failed, using General");
            Intent::General
        }
    }
}
