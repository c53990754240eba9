//! Interactive Reply Engine
//!
//! Short, button-driven dialog branches that never touch the completion
//! service. A button set is valid for exactly one click: pressing any button
//! strips every button in the conversation before the next step is produced.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::conversation::{Button, Conversation, Message};
use crate::error::{AssistantError, AssistantResult};
use crate::navigation::{NavigationIntent, NavigationRequest};
use crate::storage::DeferredKind;

pub const TEST_PREPARED_YES: &str = "test-prepared-yes";
pub const TEST_HELP_PREPARE: &str = "test-help-prepare";
pub const STUDY_MATERIALS_YES: &str = "study-materials-yes";
pub const STUDY_MATERIALS_NO: &str = "study-materials-no";

/// What follows a button click
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedStep {
    /// Append a bot message, possibly offering new buttons
    Reply { text: String, buttons: Vec<Button> },
    /// Hand off to the navigation sequencer
    Navigate(NavigationRequest),
}

impl ScriptedStep {
    fn reply(text: &str) -> Self {
        ScriptedStep::Reply {
            text: text.to_string(),
            buttons: Vec::new(),
        }
    }

    pub fn into_message(self) -> Option<Message> {
        match self {
            ScriptedStep::Reply { text, buttons } => Some(Message::bot(text).with_buttons(buttons)),
            ScriptedStep::Navigate(_) => None,
        }
    }
}

/// Result of accepting a click
#[derive(Debug, Clone, PartialEq)]
pub struct Press {
    /// The button label echoed as a user message
    pub echo: Message,
    pub step: ScriptedStep,
}

#[derive(Debug, Clone)]
pub struct InteractiveReplyEngine {
    branches: HashMap<&'static str, ScriptedStep>,
}

impl Default for InteractiveReplyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractiveReplyEngine {
    pub fn new() -> Self {
        let mut branches = HashMap::new();
        branches.insert(
            TEST_PREPARED_YES,
            ScriptedStep::reply(
                "That's great! Give it your best shot. All the best for your Indian Climate test!",
            ),
        );
        branches.insert(
            TEST_HELP_PREPARE,
            ScriptedStep::Reply {
                text: "No worries! Would you like me to show you study materials for Indian Climate?"
                    .to_string(),
                buttons: vec![
                    Button::new("Yes, show me", STUDY_MATERIALS_YES),
                    Button::new("No, thanks", STUDY_MATERIALS_NO),
                ],
            },
        );
        branches.insert(
            STUDY_MATERIALS_YES,
            ScriptedStep::Navigate(
                NavigationRequest::new(
                    NavigationIntent::new(
                        "study",
                        "Great! Taking you to the study resources for Indian Climate...",
                    )
                    .with_tab("resources")
                    .with_highlight("resource-3"),
                )
                .with_deferred(DeferredKind::ResourcesFollowUp),
            ),
        );
        branches.insert(
            STUDY_MATERIALS_NO,
            ScriptedStep::reply("Alright! Let me know whenever you need help. Good luck!"),
        );
        Self { branches }
    }

    pub fn branch(&self, action: &str) -> Option<&ScriptedStep> {
        self.branches.get(action)
    }

    /// Accept a click on `action` of message `message_id`.
    ///
    /// Returns `Ok(None)` when the button is no longer offered (already
    /// clicked, or stripped by a later click); nothing is appended then.
    /// On success the button label is appended as a user message and all
    /// buttons are stripped; the caller delivers the returned step.
    pub fn press(
        &self,
        conversation: &mut Conversation,
        message_id: Uuid,
        action: &str,
    ) -> AssistantResult<Option<Press>> {
        let Some(button) = conversation
            .get(message_id)
            .and_then(|m| m.button(action))
            .cloned()
        else {
            debug!(%message_id, action, "Ignoring click on expired button");
            return Ok(None);
        };

        let Some(step) = self.branch(action).cloned() else {
            warn!(action, "Button has no scripted branch");
            return Err(AssistantError::UnknownAction(action.to_string()));
        };

        conversation.strip_buttons()?;
        let echo = conversation.append(Message::user(button.label))?.clone();
        debug!(action, "Scripted branch selected");
        Ok(Some(Press { echo, step }))
    }
}

/// Bot message delivered after a navigation for a deferred flag
pub fn deferred_message(kind: DeferredKind) -> Message {
    match kind {
        DeferredKind::TestFollowUp => Message::bot(
            "Your next test is on Indian Climate at 5:30 pm today. Have you prepared well?",
        )
        .with_buttons(vec![
            Button::new("Yes, I'm prepared", TEST_PREPARED_YES),
            Button::new("Help me prepare", TEST_HELP_PREPARE),
        ]),
        DeferredKind::ResourcesFollowUp => Message::bot(
            "I've highlighted the Indian Climate notes for you. Go through them before your test!",
        ),
    }
}
