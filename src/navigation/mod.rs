//! Navigation Module
//!
//! Everything between "the assistant decided to move the user" and "the
//! destination page is showing":
//!
//! - `parser`: completion reply → [`Reply`] (plain message or command)
//! - `route`: path building, labels, the [`Router`] collaborator
//! - `overlay`: progress model for the transition overlay
//! - `sequencer`: the [`NavPhase`] state machine

pub mod overlay;
pub mod parser;
pub mod route;
pub mod sequencer;

pub use overlay::{OverlayTimeline, OverlayView};
pub use parser::{classify, parse, Reply};
pub use route::{destination_label, route_path, HistoryRouter, Router};
pub use sequencer::{NavPhase, NavigationSequencer};

use serde::{Deserialize, Serialize};

use crate::storage::{DeferredKind, PendingNavigation};

/// A decoded "take me there" command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationIntent {
    pub page: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_class: Option<String>,
    pub message: String,
}

impl NavigationIntent {
    pub fn new(page: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            tab: None,
            highlight_class: None,
            message: message.into(),
        }
    }

    pub fn with_tab(mut self, tab: impl Into<String>) -> Self {
        self.tab = Some(tab.into());
        self
    }

    pub fn with_highlight(mut self, class: impl Into<String>) -> Self {
        self.highlight_class = Some(class.into());
        self
    }
}

impl From<&NavigationIntent> for PendingNavigation {
    fn from(intent: &NavigationIntent) -> Self {
        PendingNavigation {
            page: intent.page.clone(),
            tab: intent.tab.clone(),
            highlight_class: intent.highlight_class.clone(),
            deferred: None,
        }
    }
}

impl From<&NavigationRequest> for PendingNavigation {
    fn from(request: &NavigationRequest) -> Self {
        PendingNavigation {
            deferred: request.deferred,
            ..PendingNavigation::from(&request.intent)
        }
    }
}

/// A navigation intent plus the deferred response to deliver once the
/// destination has mounted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub intent: NavigationIntent,
    pub deferred: Option<DeferredKind>,
}

impl NavigationRequest {
    pub fn new(intent: NavigationIntent) -> Self {
        Self {
            intent,
            deferred: None,
        }
    }

    pub fn with_deferred(mut self, kind: DeferredKind) -> Self {
        self.deferred = Some(kind);
        self
    }
}
