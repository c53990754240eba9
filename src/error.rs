//! Error handling for the navigation assistant
//!
//! Every failure the chat surface can hit is one of these variants. Remote
//! failures are converted into a single error-flagged chat message by the
//! session layer, so none of them is fatal to the UI.

use thiserror::Error;

use crate::navigation::NavPhase;

/// Main error type for the assistant core
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream error{}: {message}", status_suffix(.status))]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("Assistant is busy with a previous request")]
    Busy,

    #[error("Chat surface was unmounted before the operation finished")]
    Cancelled,

    #[error("Invalid navigation transition '{event}' from phase {from:?}")]
    InvalidTransition { from: NavPhase, event: &'static str },

    #[error("Route change failed: {0}")]
    Route(#[from] RouteError),

    #[error("Unknown scripted action '{0}'")]
    UnknownAction(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssistantError {
    /// Create configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create upstream error with an HTTP status
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create upstream error for a transport failure (no status)
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            message: message.into(),
        }
    }

    /// Create storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Text shown in the error bubble appended to the conversation
    pub fn chat_text(&self) -> String {
        match self {
            Self::Configuration(_) => {
                "The assistant is not configured yet: no API key is available.".to_string()
            }
            Self::Upstream { message, .. } => format!("Sorry, something went wrong: {}", message),
            Self::Route(e) => format!("I couldn't open that page ({}).", e),
            other => format!("Sorry, something went wrong: {}", other),
        }
    }
}

impl From<reqwest::Error> for AssistantError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::upstream(status.as_u16(), error.to_string()),
            None => Self::transport(error.to_string()),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

/// Errors reported by the router collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown destination '{0}'")]
    UnknownDestination(String),

    #[error("navigation timed out after {0} ms")]
    Timeout(u64),

    #[error("{0}")]
    Rejected(String),
}

/// Result type for assistant operations
pub type AssistantResult<T> = Result<T, AssistantError>;
