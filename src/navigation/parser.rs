//! Navigation Command Parser
//!
//! Turns a completion reply into either a plain chat message or a structured
//! navigation command. Parsing never fails: anything that is not a valid,
//! explicit navigation command degrades to a plain message.
//!
//! ## Accepted shape
//!
//! ```json
//! {"navigate": true, "page": "study", "tab": "tests",
//!  "highlightClass": "resource-3", "message": "Opening your tests"}
//! ```

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::route::destination_label;
use super::NavigationIntent;

/// Substring that marks a reply as a navigation candidate
pub const NAVIGATION_MARKER: &str = "\"navigate\"";

/// A classified completion reply
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    PlainMessage(String),
    NavigationCommand(NavigationIntent),
}

/// Wire shape of a navigation command; `navigate` is kept as a raw value so
/// `"true"` or `1` are rejected rather than coerced.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCommand {
    #[serde(default)]
    navigate: Value,
    #[serde(default)]
    page: Option<String>,
    #[serde(default)]
    tab: Option<String>,
    #[serde(default)]
    highlight_class: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Parse a reply into a navigation intent, or `None` for a plain message
pub fn parse(raw: &str) -> Option<NavigationIntent> {
    let text = raw.trim();
    let starts_with_brace = text.starts_with('{');
    if !starts_with_brace && !text.contains(NAVIGATION_MARKER) {
        return None;
    }

    let candidate = if starts_with_brace {
        text
    } else {
        outer_object(text)?
    };

    let command: RawCommand = match serde_json::from_str(candidate) {
        Ok(command) => command,
        Err(e) => {
            debug!("Reply looked structured but did not decode: {}", e);
            return None;
        }
    };

    if command.navigate != Value::Bool(true) {
        return None;
    }

    let page = non_blank(command.page)?;
    let tab = non_blank(command.tab);
    let highlight_class = non_blank(command.highlight_class);
    let message = non_blank(command.message).unwrap_or_else(|| {
        format!(
            "Taking you to {}...",
            destination_label(&page, tab.as_deref())
        )
    });

    Some(NavigationIntent {
        page,
        tab,
        highlight_class,
        message,
    })
}

/// Classify a reply into the tagged union
pub fn classify(raw: &str) -> Reply {
    match parse(raw) {
        Some(intent) => Reply::NavigationCommand(intent),
        None => Reply::PlainMessage(raw.trim().to_string()),
    }
}

/// Outermost `{ ... }` span, for replies wrapped in prose or code fences
fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
