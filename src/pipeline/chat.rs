//! Interactive questions about a review, with a bounded conversation history.
//!
//! Each `ChatSession` owns its history; there is no process-wide chat state.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{PromptUsage, StandardInfo};
use crate::pipeline::gateway::{GatewayError, LlmGateway, UsageSnapshot, UsageStats};
use crate::pipeline::prompting::{
    ContextSection, PromptComposer, PromptInputs, PromptStore, PromptStoreError,
};

/// Messages kept in a session; the oldest are dropped first.
pub const MAX_HISTORY: usize = 20;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    PromptStore(#[from] PromptStoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: NaiveDateTime,
}

impl ChatMessage {
    fn now(role: ChatRole, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            timestamp: Local::now().naive_local(),
        }
    }
}

pub struct ChatSession {
    id: Uuid,
    gateway: Arc<dyn LlmGateway>,
    prompts: Arc<dyn PromptStore>,
    standard: Option<StandardInfo>,
    history: VecDeque<ChatMessage>,
    usage: UsageStats,
}

impl ChatSession {
    pub fn new(gateway: Arc<dyn LlmGateway>, prompts: Arc<dyn PromptStore>) -> Self {
        Self {
            id: Uuid::new_v4(),
            gateway,
            prompts,
            standard: None,
            history: VecDeque::with_capacity(MAX_HISTORY),
            usage: UsageStats::new(),
        }
    }

    /// Ground answers in `standard`. The `UNKNOWN` standard adds nothing.
    pub fn with_standard(mut self, standard: StandardInfo) -> Self {
        self.standard = Some(standard);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask one question. Templates are re-read from the store on every call.
    ///
    /// Both turns are recorded only when the gateway answers; a failed call
    /// leaves the history unchanged.
    pub fn ask(&mut self, question: &str, prompt_names: &[String]) -> Result<String, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        let composer = PromptComposer::from_store(self.prompts.as_ref(), PromptUsage::Chat)?;
        let extras: Vec<ContextSection> = self
            .history_excerpt()
            .map(|body| ContextSection::new("Chat history", body))
            .into_iter()
            .collect();
        let prompt = composer.compose(
            prompt_names,
            &PromptInputs {
                standard: self.standard.as_ref(),
                extras: &extras,
                ..PromptInputs::new(PromptUsage::Chat, question)
            },
        );

        let answer = match self.gateway.call(&prompt) {
            Ok(answer) => {
                self.usage.record(&prompt, &answer);
                answer
            }
            Err(e) => {
                self.usage.record(&prompt, "");
                tracing::warn!(session = %self.id, error = %e, "Chat call failed");
                return Err(e.into());
            }
        };

        self.push(ChatMessage::now(ChatRole::User, question));
        self.push(ChatMessage::now(ChatRole::Assistant, &answer));
        tracing::debug!(session = %self.id, messages = self.history.len(), "Chat turn recorded");
        Ok(answer)
    }

    pub fn history(&self) -> impl Iterator<Item = &ChatMessage> {
        self.history.iter()
    }

    pub fn clear(&mut self) {
        self.history.clear();
        tracing::debug!(session = %self.id, "Chat history cleared");
    }

    pub fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    fn push(&mut self, message: ChatMessage) {
        while self.history.len() >= MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(message);
    }

    fn history_excerpt(&self) -> Option<String> {
        if self.history.is_empty() {
            return None;
        }
        Some(
            self.history
                .iter()
                .map(|m| format!("{}: {}", m.role.label(), m.content))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}
