//! A scripted [`ChatModel`] for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{ChatModel, PromptMessage};
use crate::config::ModelConfig;
use crate::error::{AgentError, Result};

/// Replays queued replies in order and records every prompt it receives.
#[derive(Default)]
pub(crate) struct ScriptedModel {
    replies: Mutex<VecDeque<Option<String>>>,
    calls: Mutex<Vec<Vec<PromptMessage>>>,
}

impl ScriptedModel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Some(reply.to_string()));
    }

    pub(crate) fn push_error(&self) {
        self.replies.lock().unwrap().push_back(None);
    }

    pub(crate) fn calls(&self) -> Vec<Vec<PromptMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[PromptMessage], _config: &ModelConfig) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Some(reply)) => Ok(reply),
            Some(None) => Err(AgentError::ModelInvocation("scripted failure".into())),
            None => Err(AgentError::ModelInvocation("no scripted reply left".into())),
        }
    }
}
