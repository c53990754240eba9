//! Navigation Sequencer
//!
//! Explicit state machine for the chat-driven route change:
//!
//! ```text
//! Idle ──begin──▶ MessageShown ──show_overlay──▶ OverlayVisible
//!   ▲                                                │
//!   │                                    prepare_commit + commit
//!   │                                                ▼
//!   └──settle── Resumed ◀──────resume (next mount)── Navigated
//! ```
//!
//! Each transition performs its storage writes synchronously and returns what
//! the UI should show. Timing (reading delay, overlay duration) belongs to the
//! session driver, so every transition here is testable without a clock.
//!
//! The durable records are written before anything visible happens: a reload
//! in the middle of the sequence finds the destination via [`recover`].
//!
//! [`recover`]: NavigationSequencer::recover

use tracing::{debug, info, warn};

use super::overlay::OverlayView;
use super::route::{destination_label, route_path};
use super::NavigationRequest;
use crate::conversation::Message;
use crate::error::{AssistantError, AssistantResult};
use crate::storage::{DeferredKind, DurableState, PendingNavigation};

/// Current phase of the navigation sequence
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NavPhase {
    /// Accepting input
    #[default]
    Idle,

    /// Reply shown, waiting for the user to read it
    MessageShown {
        destination: PendingNavigation,
        label: String,
        deferred: Option<DeferredKind>,
    },

    /// Progress overlay on screen, route change imminent
    OverlayVisible {
        destination: PendingNavigation,
        label: String,
        deferred: Option<DeferredKind>,
    },

    /// Route change committed; this instance is about to be replaced
    Navigated { path: String },

    /// Re-mounted; delivering deferred responses
    Resumed { deferred: Vec<DeferredKind> },
}

impl NavPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, NavPhase::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            NavPhase::Idle => "idle",
            NavPhase::MessageShown { .. } => "message_shown",
            NavPhase::OverlayVisible { .. } => "overlay_visible",
            NavPhase::Navigated { .. } => "navigated",
            NavPhase::Resumed { .. } => "resumed",
        }
    }
}

#[derive(Debug)]
pub struct NavigationSequencer {
    phase: NavPhase,
    state: DurableState,
}

impl NavigationSequencer {
    pub fn new(state: DurableState) -> Self {
        Self {
            phase: NavPhase::Idle,
            state,
        }
    }

    pub fn phase(&self) -> &NavPhase {
        &self.phase
    }

    fn invalid(&self, event: &'static str) -> AssistantError {
        AssistantError::InvalidTransition {
            from: self.phase.clone(),
            event,
        }
    }

    /// `Idle → MessageShown`
    ///
    /// Persists the pending navigation (and deferred flag) and returns the bot
    /// message to append.
    pub fn begin(&mut self, request: &NavigationRequest) -> AssistantResult<Message> {
        if !self.phase.is_idle() {
            return Err(self.invalid("begin"));
        }

        let destination = PendingNavigation::from(request);
        let label = destination_label(&destination.page, destination.tab.as_deref());

        self.state.set_pending_navigation(&destination)?;
        if let Some(kind) = request.deferred {
            self.state.set_flag(kind)?;
        }

        info!(page = %destination.page, tab = ?destination.tab, %label, "Navigation sequence started");
        self.phase = NavPhase::MessageShown {
            destination,
            label,
            deferred: request.deferred,
        };
        Ok(Message::bot(request.intent.message.clone()))
    }

    /// `MessageShown → OverlayVisible`
    pub fn show_overlay(&mut self) -> AssistantResult<OverlayView> {
        match std::mem::take(&mut self.phase) {
            NavPhase::MessageShown {
                destination,
                label,
                deferred,
            } => {
                let view = OverlayView::new(label.clone());
                self.phase = NavPhase::OverlayVisible {
                    destination,
                    label,
                    deferred,
                };
                Ok(view)
            }
            other => {
                self.phase = other;
                Err(self.invalid("show_overlay"))
            }
        }
    }

    /// Resolve the route for the pending record and write the side records
    /// the destination page reads: highlight target and keep-open flag.
    ///
    /// Stays in `OverlayVisible`; call [`commit`](Self::commit) once the
    /// router accepted the path or [`abort`](Self::abort) if it did not.
    pub fn prepare_commit(&mut self) -> AssistantResult<String> {
        let in_memory = match &self.phase {
            NavPhase::OverlayVisible { destination, .. } => destination.clone(),
            _ => return Err(self.invalid("prepare_commit")),
        };

        // The durable record is authoritative; it may have been overwritten.
        let destination = self.state.pending_navigation()?.unwrap_or(in_memory);
        let stage = self.state.stage()?;
        let path = route_path(&stage, &destination);

        match destination.highlight_class.as_deref() {
            Some(class) => self.state.set_highlight_class(class)?,
            None => self.state.clear_highlight_class()?,
        }
        self.state.set_keep_open()?;

        debug!(%path, "Route prepared");
        Ok(path)
    }

    /// `OverlayVisible → Navigated`; clears the pending record
    pub fn commit(&mut self, path: &str) -> AssistantResult<()> {
        if !matches!(self.phase, NavPhase::OverlayVisible { .. }) {
            return Err(self.invalid("commit"));
        }
        self.state.clear_pending_navigation()?;
        info!(path, "Navigation committed");
        self.phase = NavPhase::Navigated {
            path: path.to_string(),
        };
        Ok(())
    }

    /// Roll back an in-flight sequence: every durable record written for it is
    /// removed and the phase returns to `Idle`.
    ///
    /// The phase is reset before any storage call, so a failing store still
    /// leaves the sequencer accepting input; the first storage error is
    /// returned after every removal has been attempted. From `Idle` only a
    /// half-written sequence (pending record present) is rolled back.
    pub fn abort(&mut self) -> AssistantResult<()> {
        let from = self.phase.name();
        let deferred = match std::mem::take(&mut self.phase) {
            NavPhase::MessageShown { deferred, .. } | NavPhase::OverlayVisible { deferred, .. } => {
                deferred
            }
            NavPhase::Idle => match self.state.pending_navigation()? {
                Some(pending) => pending.deferred,
                None => return Ok(()),
            },
            _ => None,
        };
        let deferred = match deferred {
            Some(kind) => Some(kind),
            None => self
                .state
                .pending_navigation()
                .ok()
                .flatten()
                .and_then(|p| p.deferred),
        };
        warn!(phase = from, ?deferred, "Aborting navigation sequence");

        let results = [
            self.state.clear_pending_navigation(),
            self.state.clear_highlight_class(),
            self.state.clear_keep_open(),
            deferred.map_or(Ok(()), |kind| self.state.clear_flag(kind)),
        ];
        results.into_iter().collect::<AssistantResult<Vec<()>>>()?;
        Ok(())
    }

    /// `Idle → OverlayVisible` when a pending navigation survived a reload.
    ///
    /// Returns the overlay to show, or `None` when nothing is pending.
    pub fn recover(&mut self) -> AssistantResult<Option<OverlayView>> {
        if !self.phase.is_idle() {
            return Err(self.invalid("recover"));
        }
        let Some(destination) = self.state.pending_navigation()? else {
            return Ok(None);
        };
        let label = destination_label(&destination.page, destination.tab.as_deref());
        info!(page = %destination.page, "Recovering interrupted navigation");
        let view = OverlayView::new(label.clone());
        let deferred = destination.deferred;
        self.phase = NavPhase::OverlayVisible {
            destination,
            label,
            deferred,
        };
        Ok(Some(view))
    }

    /// `Navigated | Idle → Resumed`
    ///
    /// Consumes every deferred flag that is set. Flags are cleared here,
    /// before the caller renders anything, so each response is delivered at
    /// most once.
    pub fn resume(&mut self) -> AssistantResult<Vec<DeferredKind>> {
        if !matches!(self.phase, NavPhase::Idle | NavPhase::Navigated { .. }) {
            return Err(self.invalid("resume"));
        }
        let mut deferred = Vec::new();
        for kind in DeferredKind::ALL {
            if self.state.take_flag(kind)? {
                deferred.push(kind);
            }
        }
        if !deferred.is_empty() {
            debug!(?deferred, "Resuming with deferred responses");
        }
        self.phase = NavPhase::Resumed {
            deferred: deferred.clone(),
        };
        Ok(deferred)
    }

    /// `Resumed → Idle`
    pub fn settle(&mut self) -> AssistantResult<()> {
        match self.phase {
            NavPhase::Resumed { .. } | NavPhase::Idle => {
                self.phase = NavPhase::Idle;
                Ok(())
            }
            _ => Err(self.invalid("settle")),
        }
    }
}
