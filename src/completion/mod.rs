//! Remote Completion Client
//!
//! Unified interface for the text-completion service the assistant falls back
//! to when no local intent matched.

mod openai;

pub use openai::OpenAiCompletionClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::{Message, Sender};
use crate::error::AssistantResult;

/// Instructions sent ahead of every conversation
pub const SYSTEM_PROMPT: &str = r#"You are a friendly study assistant inside an exam-preparation dashboard for UPSC, school and college students.

Answer study questions clearly and concisely.

When the student asks to go somewhere in the dashboard, respond ONLY with JSON of this shape:
{"navigate": true, "page": "<page>", "tab": "<optional tab>", "highlightClass": "<optional element id>", "message": "<short message for the student>"}

Pages: dashboard, study (tabs: tests, resources, classes), activities, events, classes, profile, leaderboard.
Otherwise reply with plain text."#;

/// One chat turn on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// System instruction, then the history without error bubbles, then the
/// latest user turn.
pub fn build_turns(history: &[Message], latest: &str) -> Vec<ChatTurn> {
    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(ChatTurn::new("system", SYSTEM_PROMPT));
    turns.extend(history.iter().filter(|m| !m.is_error).map(|m| {
        let role = match m.sender {
            Sender::User => "user",
            Sender::Bot => "assistant",
        };
        ChatTurn::new(role, m.text.clone())
    }));
    turns.push(ChatTurn::new("user", latest));
    turns
}

/// Text-completion service
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `history` plus the `latest` user turn; return the raw reply text
    async fn complete(&self, history: &[Message], latest: &str) -> AssistantResult<String>;

    /// Get the model name for logging
    fn model_name(&self) -> &str;
}
