//! Responder kinds: which system prompt and history each reply uses.

use std::fmt;

use crate::intent::Intent;
use crate::prompts;

/// Where a responder takes its history from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPolicy {
    /// The last messages of the user's current conversation.
    ConversationWindow,
    /// Every human message the user ever wrote.
    AllHumanMessages,
    /// Recent human messages of a whole lab group.
    GroupActivity,
}

/// A prompt-engineered response generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponderKind {
    General,
    Guidance,
    Teaching,
    LearningStyle,
    Rollcall,
    Misconception,
    Sitrep,
}

impl ResponderKind {
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::General => prompts::GENERAL_PROMPT,
            Self::Guidance => prompts::GUIDANCE_PROMPT,
            Self::Teaching => prompts::TEACHING_PROMPT,
            Self::LearningStyle => prompts::LEARNING_STYLE_PROMPT,
            Self::Rollcall => prompts::ROLLCALL_PROMPT,
            Self::Misconception => prompts::MISCONCEPTION_PROMPT,
            Self::Sitrep => prompts::SITREP_PROMPT,
        }
    }

    pub fn history_policy(&self) -> HistoryPolicy {
        match self {
            Self::General | Self::Guidance | Self::Teaching => HistoryPolicy::ConversationWindow,
            Self::LearningStyle => HistoryPolicy::AllHumanMessages,
            Self::Rollcall | Self::Misconception | Self::Sitrep => HistoryPolicy::GroupActivity,
        }
    }

    /// Whether document retrieval is added to the prompt.
    pub fn uses_retrieval(&self) -> bool {
        self.history_policy() == HistoryPolicy::ConversationWindow
    }
}

impl From<Intent> for ResponderKind {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::General => Self::General,
            Intent::Guidance => Self::Guidance,
        }
    }
}

impl fmt::Display for ResponderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::General => "general",
            Self::Guidance => "guidance",
            Self::Teaching => "teaching",
            Self::LearningStyle => "learning_style",
            Self::Rollcall => "rollcall",
            Self::Misconception => "misconception",
            Self::Sitrep => "sitrep",
        };
        f.write_str(name)
    }
}
