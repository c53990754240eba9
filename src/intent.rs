//! Intent Interceptor
//!
//! High-priority intents answered locally, before any remote call. Matching is
//! a case-insensitive substring test against two fixed pattern lists; the
//! next-test list is checked first, so text matching both resolves to it.

use serde::Serialize;
use tracing::debug;

use crate::navigation::{NavigationIntent, NavigationRequest};
use crate::storage::DeferredKind;

const NEXT_TEST_PATTERNS: &[&str] = &[
    "next test",
    "upcoming test",
    "when is my test",
    "test schedule",
    "next exam",
    "upcoming exam",
    "when is my exam",
];

const REVIEW_CLASSES_PATTERNS: &[&str] = &[
    "review classes",
    "review class",
    "review my classes",
    "revise classes",
    "revise my classes",
    "class review",
    "recap classes",
];

/// Modals the chat surface can open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Modal {
    ReviewClasses,
}

/// Outcome of a local match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptResult {
    /// Navigate to the tests tab and ask about preparation on arrival
    NextTest(NavigationRequest),
    /// Open the class review popup in place
    ReviewClasses { modal: Modal, message: String },
}

impl InterceptResult {
    pub fn deferred(&self) -> Option<DeferredKind> {
        match self {
            InterceptResult::NextTest(request) => request.deferred,
            InterceptResult::ReviewClasses { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntentInterceptor;

impl IntentInterceptor {
    pub fn new() -> Self {
        Self
    }

    /// Match raw user text; `None` means the remote service should answer
    pub fn intercept(&self, user_text: &str) -> Option<InterceptResult> {
        let text = user_text.to_lowercase();

        if NEXT_TEST_PATTERNS.iter().any(|p| text.contains(p)) {
            debug!("Intercepted next-test intent");
            let intent = NavigationIntent::new("study", "Let me check your test schedule...")
                .with_tab("tests");
            return Some(InterceptResult::NextTest(
                NavigationRequest::new(intent).with_deferred(DeferredKind::TestFollowUp),
            ));
        }

        if REVIEW_CLASSES_PATTERNS.iter().any(|p| text.contains(p)) {
            debug!("Intercepted review-classes intent");
            return Some(InterceptResult::ReviewClasses {
                modal: Modal::ReviewClasses,
                message: "Opening your class review. Pick a subject to get started!".to_string(),
            });
        }

        None
    }
}
