//! Persisted Conversation
//!
//! Append-only log of chat turns. Every mutation is written through to the
//! durable store so a re-mounted chat surface picks up where the previous
//! instance left off. The log is cleared when a new session starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::AssistantResult;
use crate::storage::DurableState;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Bot,
    User,
}

/// A clickable reply option attached to a bot message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub action: String,
}

impl Button {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

/// One chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
}

impl Message {
    fn new(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
            is_error: false,
            buttons: Vec::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, Sender::User)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(text, Sender::Bot)
    }

    /// Error bubble; excluded from the history sent upstream
    pub fn error(text: impl Into<String>) -> Self {
        let mut message = Self::bot(text);
        message.is_error = true;
        message
    }

    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    pub fn button(&self, action: &str) -> Option<&Button> {
        self.buttons.iter().find(|b| b.action == action)
    }
}

/// Session-scoped chat log, written through to [`DurableState`]
#[derive(Debug)]
pub struct Conversation {
    messages: Vec<Message>,
    state: DurableState,
}

impl Conversation {
    /// Load the log persisted by a previous instance, if any
    pub fn load(state: DurableState) -> AssistantResult<Self> {
        let messages = match state.conversation_json()? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Discarding unreadable conversation log: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        Ok(Self { messages, state })
    }

    /// Start an empty log, dropping anything persisted
    pub fn fresh(state: DurableState) -> AssistantResult<Self> {
        state.clear_conversation()?;
        Ok(Self {
            messages: Vec::new(),
            state,
        })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn append(&mut self, message: Message) -> AssistantResult<&Message> {
        self.messages.push(message);
        self.persist()?;
        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Remove buttons from every message so no earlier button set can be
    /// clicked again. Returns how many messages lost their buttons.
    pub fn strip_buttons(&mut self) -> AssistantResult<usize> {
        let mut stripped = 0;
        for message in self.messages.iter_mut().filter(|m| !m.buttons.is_empty()) {
            message.buttons.clear();
            stripped += 1;
        }
        if stripped > 0 {
            self.persist()?;
        }
        Ok(stripped)
    }

    pub fn clear(&mut self) -> AssistantResult<()> {
        self.messages.clear();
        self.state.clear_conversation()
    }

    fn persist(&self) -> AssistantResult<()> {
        let raw = serde_json::to_string(&self.messages)?;
        self.state.set_conversation_json(&raw)
    }
}
