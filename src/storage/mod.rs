//! Durable Key-Value Storage
//!
//! The chat surface is torn down and re-mounted on every route change. The
//! only state that crosses that boundary lives in a [`KeyValueStore`]:
//!
//! ```text
//! assistant.conversation          session conversation log (JSON)
//! assistant.pendingNavigation     destination awaiting a route change (JSON)
//! assistant.highlightClass        element id the destination page highlights
//! assistant.keepOpen              re-open the chat after the route change
//! assistant.deferred.<kind>       read-once deferred response flags
//! preferences.stage               route prefix (upsc, school, college)
//! preferences.audioMuted.<user>   narration mute preference
//! ```
//!
//! [`DurableState`] wraps the raw store with typed accessors so callers never
//! touch key strings directly.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AssistantResult;

pub const CONVERSATION_KEY: &str = "assistant.conversation";
pub const PENDING_NAVIGATION_KEY: &str = "assistant.pendingNavigation";
pub const HIGHLIGHT_CLASS_KEY: &str = "assistant.highlightClass";
pub const KEEP_OPEN_KEY: &str = "assistant.keepOpen";
pub const STAGE_KEY: &str = "preferences.stage";

const DEFERRED_PREFIX: &str = "assistant.deferred.";
const AUDIO_MUTED_PREFIX: &str = "preferences.audioMuted.";

/// Stage used when no preference has been stored
pub const DEFAULT_STAGE: &str = "upsc";

/// Raw string store consumed by the assistant.
///
/// Implementations must make writes visible to subsequent reads from any
/// handle sharing the same backing storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> AssistantResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> AssistantResult<()>;

    fn remove(&self, key: &str) -> AssistantResult<()>;
}

/// Destination held durably until a route change commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingNavigation {
    pub page: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_class: Option<String>,
    /// Follow-up flagged for this navigation; rolled back with it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deferred: Option<DeferredKind>,
}

/// Kinds of scripted response delivered after a navigation completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferredKind {
    /// "Your next test is on ..." after landing on the tests tab
    TestFollowUp,
    /// Pointer to the highlighted resource after landing on resources
    ResourcesFollowUp,
}

impl DeferredKind {
    /// Every kind, in delivery order
    pub const ALL: [DeferredKind; 2] = [DeferredKind::TestFollowUp, DeferredKind::ResourcesFollowUp];

    fn key(self) -> String {
        let suffix = match self {
            DeferredKind::TestFollowUp => "testFollowUp",
            DeferredKind::ResourcesFollowUp => "resourcesFollowUp",
        };
        format!("{}{}", DEFERRED_PREFIX, suffix)
    }
}

/// Typed accessors over a shared [`KeyValueStore`]
#[derive(Clone)]
pub struct DurableState {
    store: Arc<dyn KeyValueStore>,
    default_stage: String,
}

impl std::fmt::Debug for DurableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableState")
            .field("default_stage", &self.default_stage)
            .finish_non_exhaustive()
    }
}

impl DurableState {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            default_stage: DEFAULT_STAGE.to_string(),
        }
    }

    /// Stage returned by [`stage`](Self::stage) when no preference is stored
    pub fn with_default_stage(mut self, stage: impl Into<String>) -> Self {
        self.default_stage = stage.into();
        self
    }

    /// Convenience constructor over a fresh [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn raw(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Deferred response flags
    // ------------------------------------------------------------------

    pub fn get_flag(&self, kind: DeferredKind) -> AssistantResult<bool> {
        self.get_bool(&kind.key())
    }

    pub fn set_flag(&self, kind: DeferredKind) -> AssistantResult<()> {
        debug!(?kind, "Setting deferred response flag");
        self.store.set(&kind.key(), "true")
    }

    pub fn clear_flag(&self, kind: DeferredKind) -> AssistantResult<()> {
        self.store.remove(&kind.key())
    }

    /// Read-once: returns whether the flag was set and clears it before
    /// returning, so a second call (or a second mount) sees `false`.
    pub fn take_flag(&self, kind: DeferredKind) -> AssistantResult<bool> {
        let set = self.get_flag(kind)?;
        if set {
            self.clear_flag(kind)?;
            debug!(?kind, "Consumed deferred response flag");
        }
        Ok(set)
    }

    // ------------------------------------------------------------------
    // Pending navigation
    // ------------------------------------------------------------------

    pub fn pending_navigation(&self) -> AssistantResult<Option<PendingNavigation>> {
        match self.store.get(PENDING_NAVIGATION_KEY)? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(pending) => Ok(Some(pending)),
                Err(e) => {
                    warn!("Discarding unreadable pending navigation: {}", e);
                    self.store.remove(PENDING_NAVIGATION_KEY)?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Overwrites any in-flight pending navigation
    pub fn set_pending_navigation(&self, pending: &PendingNavigation) -> AssistantResult<()> {
        debug!(page = %pending.page, tab = ?pending.tab, "Writing pending navigation");
        let raw = serde_json::to_string(pending)?;
        self.store.set(PENDING_NAVIGATION_KEY, &raw)
    }

    pub fn clear_pending_navigation(&self) -> AssistantResult<()> {
        self.store.remove(PENDING_NAVIGATION_KEY)
    }

    // ------------------------------------------------------------------
    // Highlight target / keep-open
    // ------------------------------------------------------------------

    pub fn highlight_class(&self) -> AssistantResult<Option<String>> {
        self.store.get(HIGHLIGHT_CLASS_KEY)
    }

    pub fn set_highlight_class(&self, class: &str) -> AssistantResult<()> {
        self.store.set(HIGHLIGHT_CLASS_KEY, class)
    }

    pub fn clear_highlight_class(&self) -> AssistantResult<()> {
        self.store.remove(HIGHLIGHT_CLASS_KEY)
    }

    /// Called by the destination page once it has highlighted the element
    pub fn take_highlight_class(&self) -> AssistantResult<Option<String>> {
        let class = self.highlight_class()?;
        if class.is_some() {
            self.clear_highlight_class()?;
        }
        Ok(class)
    }

    pub fn set_keep_open(&self) -> AssistantResult<()> {
        self.store.set(KEEP_OPEN_KEY, "true")
    }

    pub fn clear_keep_open(&self) -> AssistantResult<()> {
        self.store.remove(KEEP_OPEN_KEY)
    }

    /// Read-once "assistant should reopen" flag
    pub fn take_keep_open(&self) -> AssistantResult<bool> {
        let set = self.get_bool(KEEP_OPEN_KEY)?;
        if set {
            self.clear_keep_open()?;
        }
        Ok(set)
    }

    // ------------------------------------------------------------------
    // Preferences
    // ------------------------------------------------------------------

    pub fn stage(&self) -> AssistantResult<String> {
        Ok(self
            .store
            .get(STAGE_KEY)?
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.default_stage.clone()))
    }

    pub fn set_stage(&self, stage: &str) -> AssistantResult<()> {
        self.store.set(STAGE_KEY, stage)
    }

    pub fn audio_muted(&self, user: &str) -> AssistantResult<bool> {
        self.get_bool(&format!("{}{}", AUDIO_MUTED_PREFIX, user))
    }

    pub fn set_audio_muted(&self, user: &str, muted: bool) -> AssistantResult<()> {
        self.store.set(
            &format!("{}{}", AUDIO_MUTED_PREFIX, user),
            if muted { "true" } else { "false" },
        )
    }

    // ------------------------------------------------------------------
    // Conversation log
    // ------------------------------------------------------------------

    pub fn conversation_json(&self) -> AssistantResult<Option<String>> {
        self.store.get(CONVERSATION_KEY)
    }

    pub fn set_conversation_json(&self, raw: &str) -> AssistantResult<()> {
        self.store.set(CONVERSATION_KEY, raw)
    }

    pub fn clear_conversation(&self) -> AssistantResult<()> {
        self.store.remove(CONVERSATION_KEY)
    }

    fn get_bool(&self, key: &str) -> AssistantResult<bool> {
        Ok(matches!(self.store.get(key)?.as_deref(), Some("true")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_flag_is_read_once() {
        let state = DurableState::in_memory();
        state.set_flag(DeferredKind::TestFollowUp).unwrap();

        assert!(state.take_flag(DeferredKind::TestFollowUp).unwrap());
        assert!(!state.take_flag(DeferredKind::TestFollowUp).unwrap());
        assert!(!state.get_flag(DeferredKind::TestFollowUp).unwrap());
    }

    #[test]
    fn test_flags_are_independent_per_kind() {
        let state = DurableState::in_memory();
        state.set_flag(DeferredKind::ResourcesFollowUp).unwrap();

        assert!(!state.get_flag(DeferredKind::TestFollowUp).unwrap());
        assert!(state.get_flag(DeferredKind::ResourcesFollowUp).unwrap());
    }

    #[test]
    fn test_pending_navigation_overwrites() {
        let state = DurableState::in_memory();
        state
            .set_pending_navigation(&PendingNavigation {
                page: "study".into(),
                tab: Some("tests".into()),
                highlight_class: None,
                deferred: Some(DeferredKind::TestFollowUp),
            })
            .unwrap();
        state
            .set_pending_navigation(&PendingNavigation {
                page: "dashboard".into(),
                tab: None,
                highlight_class: None,
                deferred: None,
            })
            .unwrap();

        let pending = state.pending_navigation().unwrap().unwrap();
        assert_eq!(pending.page, "dashboard");
        assert_eq!(pending.tab, None);

        state.clear_pending_navigation().unwrap();
        assert!(state.pending_navigation().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_pending_navigation_is_dropped() {
        let state = DurableState::in_memory();
        state.raw().set(PENDING_NAVIGATION_KEY, "{not json").unwrap();

        assert!(state.pending_navigation().unwrap().is_none());
        assert!(state.raw().get(PENDING_NAVIGATION_KEY).unwrap().is_none());
    }

    #[test]
    fn test_stage_defaults_when_absent() {
        let state = DurableState::in_memory();
        assert_eq!(state.stage().unwrap(), DEFAULT_STAGE);

        state.set_stage("college").unwrap();
        assert_eq!(state.stage().unwrap(), "college");

        let school = DurableState::in_memory().with_default_stage("school");
        assert_eq!(school.stage().unwrap(), "school");
    }

    #[test]
    fn test_keep_open_and_highlight_read_once() {
        let state = DurableState::in_memory();
        state.set_keep_open().unwrap();
        state.set_highlight_class("resource-3").unwrap();

        assert!(state.take_keep_open().unwrap());
        assert!(!state.take_keep_open().unwrap());
        assert_eq!(
            state.take_highlight_class().unwrap().as_deref(),
            Some("resource-3")
        );
        assert!(state.highlight_class().unwrap().is_none());
    }

    #[test]
    fn test_audio_mute_is_per_user() {
        let state = DurableState::in_memory();
        state.set_audio_muted("asha", true).unwrap();

        assert!(state.audio_muted("asha").unwrap());
        assert!(!state.audio_muted("ravi").unwrap());

        state.set_audio_muted("asha", false).unwrap();
        assert!(!state.audio_muted("asha").unwrap());
    }
}
