//! Chat Session
//!
//! One mounted chat surface. Owns the in-memory view of the conversation and
//! the navigation sequencer, and drives them with the pacing timers.
//!
//! # Lifecycle
//!
//! ```text
//! mount() ─▶ resume() ─▶ send()/click() ... ─▶ unmount()
//!    │          │
//!    │          └─ delivers deferred responses, or finishes a navigation
//!    │             interrupted by a reload
//!    └─ consumes keep-open and deferred flags before anything renders
//! ```
//!
//! A route change replaces the whole surface: the UI drops this session and
//! mounts a new one with [`MountReason::AfterNavigation`] over the same
//! durable store.

mod lifetime;

pub use lifetime::Lifetime;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::completion::CompletionClient;
use crate::config::PacingConfig;
use crate::conversation::{Conversation, Message};
use crate::error::{AssistantError, AssistantResult, RouteError};
use crate::intent::{IntentInterceptor, InterceptResult, Modal};
use crate::navigation::{
    classify, NavPhase, NavigationRequest, NavigationSequencer, OverlayTimeline, OverlayView,
    Reply, Router,
};
use crate::scripted::{deferred_message, InteractiveReplyEngine, ScriptedStep};
use crate::storage::DurableState;

/// Greeting shown when a new session starts with an empty log
pub const GREETING: &str =
    "Hi! I'm your study assistant. Ask me anything, or try \"When is my next test?\"";

/// Collaborators a chat surface needs
#[derive(Clone)]
pub struct SessionDeps {
    pub state: DurableState,
    pub completion: Arc<dyn CompletionClient>,
    pub router: Arc<dyn Router>,
    pub pacing: PacingConfig,
}

/// Why the surface is being mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountReason {
    /// Page load or reload; the conversation log starts over
    NewSession,
    /// Re-mount after an assistant-driven route change
    AfterNavigation,
}

/// Snapshot the UI renders from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurfaceStatus {
    pub open: bool,
    pub loading: bool,
    pub phase: &'static str,
    pub overlay: Option<OverlayView>,
    pub modal: Option<Modal>,
}

impl Default for SurfaceStatus {
    fn default() -> Self {
        Self {
            open: false,
            loading: false,
            phase: NavPhase::Idle.name(),
            overlay: None,
            modal: None,
        }
    }
}

/// What a send, click or resume produced
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Nothing to do (blank input, expired button, nothing deferred)
    Ignored,
    /// Bot messages appended, in order
    Replied(Vec<Message>),
    ModalOpened(Modal),
    Navigated { path: String },
    /// An error bubble was appended
    Failed(Message),
}

pub struct ChatSession {
    state: DurableState,
    completion: Arc<dyn CompletionClient>,
    router: Arc<dyn Router>,
    pacing: PacingConfig,
    interceptor: IntentInterceptor,
    engine: InteractiveReplyEngine,
    conversation: Mutex<Conversation>,
    sequencer: Mutex<NavigationSequencer>,
    loading: AtomicBool,
    status: watch::Sender<SurfaceStatus>,
    lifetime: Lifetime,
}

/// Clears the loading flag however the turn ends
struct LoadingGuard<'a> {
    session: &'a ChatSession,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.session.loading.store(false, Ordering::SeqCst);
        self.session.status.send_modify(|s| s.loading = false);
    }
}

fn poisoned(what: &str) -> AssistantError {
    AssistantError::storage(format!("{} lock poisoned", what))
}

impl ChatSession {
    /// Mount a chat surface.
    ///
    /// Durable read-once records (keep-open, deferred flags) are consumed
    /// here, before the caller renders anything. Call [`resume`](Self::resume)
    /// next to deliver what they asked for.
    pub fn mount(deps: SessionDeps, reason: MountReason) -> AssistantResult<Self> {
        let SessionDeps {
            state,
            completion,
            router,
            pacing,
        } = deps;

        let keep_open = state.take_keep_open()?;
        let mut conversation = match reason {
            MountReason::NewSession if !keep_open => Conversation::fresh(state.clone())?,
            _ => Conversation::load(state.clone())?,
        };

        let mut sequencer = NavigationSequencer::new(state.clone());
        let interrupted = state.pending_navigation()?.is_some();
        if !interrupted {
            let deferred = sequencer.resume()?;
            if deferred.is_empty() {
                sequencer.settle()?;
            }
        }

        if conversation.is_empty() && sequencer.phase().is_idle() && !interrupted {
            conversation.append(Message::bot(GREETING))?;
        }

        info!(
            ?reason,
            keep_open,
            interrupted,
            messages = conversation.len(),
            "Chat surface mounted"
        );

        let (status, _) = watch::channel(SurfaceStatus {
            open: keep_open || reason == MountReason::AfterNavigation,
            phase: sequencer.phase().name(),
            ..SurfaceStatus::default()
        });

        Ok(Self {
            state,
            completion,
            router,
            pacing,
            interceptor: IntentInterceptor::new(),
            engine: InteractiveReplyEngine::new(),
            conversation: Mutex::new(conversation),
            sequencer: Mutex::new(sequencer),
            loading: AtomicBool::new(false),
            status,
            lifetime: Lifetime::new(),
        })
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn status(&self) -> watch::Receiver<SurfaceStatus> {
        self.status.subscribe()
    }

    pub fn snapshot(&self) -> SurfaceStatus {
        self.status.borrow().clone()
    }

    pub fn messages(&self) -> AssistantResult<Vec<Message>> {
        Ok(self.conversation()?.messages().to_vec())
    }

    pub fn phase(&self) -> AssistantResult<NavPhase> {
        Ok(self.sequencer()?.phase().clone())
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime.clone()
    }

    pub fn state(&self) -> &DurableState {
        &self.state
    }

    // ------------------------------------------------------------------
    // Surface controls
    // ------------------------------------------------------------------

    pub fn open(&self) {
        self.status.send_modify(|s| s.open = true);
    }

    pub fn close(&self) {
        self.status.send_modify(|s| s.open = false);
    }

    pub fn close_modal(&self) {
        self.status.send_modify(|s| s.modal = None);
    }

    /// Explicit "clear chat"
    pub fn clear(&self) -> AssistantResult<()> {
        if self.is_loading() {
            return Err(AssistantError::Busy);
        }
        self.conversation()?.clear()?;
        info!("Conversation cleared");
        Ok(())
    }

    /// Tear the surface down; in-flight work is discarded
    pub fn unmount(&self) {
        debug!("Chat surface unmounted");
        self.lifetime.cancel();
    }

    // ------------------------------------------------------------------
    // Turns
    // ------------------------------------------------------------------

    /// Deliver whatever the mount found: deferred responses after a
    /// navigation, or the route change of a sequence interrupted by a reload.
    pub async fn resume(&self) -> AssistantResult<TurnOutcome> {
        let phase = self.phase()?;
        match phase {
            NavPhase::Idle => {
                let recovered = self.sequencer()?.recover()?;
                match recovered {
                    Some(overlay) => {
                        let _guard = self.begin_loading()?;
                        self.sync_phase()?;
                        self.status.send_modify(|s| s.overlay = Some(overlay));
                        let finished = self.finish_navigation().await;
                        self.roll_back_on_failure(finished)
                    }
                    None => Ok(TurnOutcome::Ignored),
                }
            }
            NavPhase::Navigated { .. } => {
                self.sequencer()?.resume()?;
                self.deliver_deferred().await
            }
            NavPhase::Resumed { .. } => self.deliver_deferred().await,
            _ => Err(AssistantError::Busy),
        }
    }

    /// Handle typed user input
    pub async fn send(&self, text: &str) -> AssistantResult<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }
        self.ensure_idle()?;
        let _guard = self.begin_loading()?;

        let history = {
            let mut conversation = self.conversation()?;
            let history = conversation.messages().to_vec();
            conversation.append(Message::user(text))?;
            history
        };

        if let Some(intercepted) = self.interceptor.intercept(text) {
            return match intercepted {
                InterceptResult::NextTest(request) => self.run_navigation(request).await,
                InterceptResult::ReviewClasses { modal, message } => {
                    self.conversation()?.append(Message::bot(message))?;
                    self.status.send_modify(|s| s.modal = Some(modal));
                    Ok(TurnOutcome::ModalOpened(modal))
                }
            };
        }

        let result = self
            .lifetime
            .run(self.completion.complete(&history, text))
            .await?;

        match result {
            Ok(raw) => match classify(&raw) {
                Reply::PlainMessage(reply) => {
                    let message = self.conversation()?.append(Message::bot(reply))?.clone();
                    Ok(TurnOutcome::Replied(vec![message]))
                }
                Reply::NavigationCommand(intent) => {
                    self.run_navigation(NavigationRequest::new(intent)).await
                }
            },
            Err(e) => {
                error!(model = self.completion.model_name(), "Completion failed: {}", e);
                self.append_error(&e)
            }
        }
    }

    /// Handle a click on `action` of message `message_id`
    pub async fn click(&self, message_id: Uuid, action: &str) -> AssistantResult<TurnOutcome> {
        self.ensure_idle()?;
        let _guard = self.begin_loading()?;

        let press = {
            let mut conversation = self.conversation()?;
            self.engine.press(&mut conversation, message_id, action)?
        };
        let Some(press) = press else {
            return Ok(TurnOutcome::Ignored);
        };

        self.lifetime.sleep(self.pacing.scripted_delay()).await?;

        match press.step {
            ScriptedStep::Navigate(request) => self.run_navigation(request).await,
            step @ ScriptedStep::Reply { .. } => match step.into_message() {
                Some(message) => {
                    let message = self.conversation()?.append(message)?.clone();
                    Ok(TurnOutcome::Replied(vec![message]))
                }
                None => Ok(TurnOutcome::Ignored),
            },
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn conversation(&self) -> AssistantResult<MutexGuard<'_, Conversation>> {
        self.conversation.lock().map_err(|_| poisoned("conversation"))
    }

    fn sequencer(&self) -> AssistantResult<MutexGuard<'_, NavigationSequencer>> {
        self.sequencer.lock().map_err(|_| poisoned("sequencer"))
    }

    fn ensure_idle(&self) -> AssistantResult<()> {
        if self.sequencer()?.phase().is_idle() {
            Ok(())
        } else {
            Err(AssistantError::Busy)
        }
    }

    fn begin_loading(&self) -> AssistantResult<LoadingGuard<'_>> {
        if self.loading.swap(true, Ordering::SeqCst) {
            debug!("Rejecting input while a request is pending");
            return Err(AssistantError::Busy);
        }
        self.status.send_modify(|s| s.loading = true);
        Ok(LoadingGuard { session: self })
    }

    fn sync_phase(&self) -> AssistantResult<()> {
        let name = self.sequencer()?.phase().name();
        self.status.send_modify(|s| s.phase = name);
        Ok(())
    }

    fn append_error(&self, e: &AssistantError) -> AssistantResult<TurnOutcome> {
        let message = self
            .conversation()?
            .append(Message::error(e.chat_text()))?
            .clone();
        Ok(TurnOutcome::Failed(message))
    }

    /// `Idle → MessageShown → OverlayVisible → Navigated`
    ///
    /// Any failure other than cancellation rolls the sequence back.
    async fn run_navigation(&self, request: NavigationRequest) -> AssistantResult<TurnOutcome> {
        let navigated = self.navigation_steps(request).await;
        self.roll_back_on_failure(navigated)
    }

    async fn navigation_steps(&self, request: NavigationRequest) -> AssistantResult<TurnOutcome> {
        let message = self.sequencer()?.begin(&request)?;
        self.conversation()?.append(message)?;
        self.sync_phase()?;

        self.lifetime.sleep(self.pacing.message_delay()).await?;

        let overlay = self.sequencer()?.show_overlay()?;
        self.sync_phase()?;
        self.status.send_modify(|s| s.overlay = Some(overlay));

        self.finish_navigation().await
    }

    /// Animate the overlay, then perform exactly one route change.
    ///
    /// The router call is bounded by the overlay timeout; on failure the
    /// sequence is rolled back and an error bubble appended.
    async fn finish_navigation(&self) -> AssistantResult<TurnOutcome> {
        let duration = self.pacing.overlay_duration();
        if !duration.is_zero() {
            let timeline = OverlayTimeline::new(duration, self.pacing.overlay_tick());
            for step in 1..=timeline.steps() {
                self.lifetime.sleep(timeline.tick()).await?;
                let progress = timeline.progress_at(step);
                self.status.send_modify(|s| {
                    if let Some(overlay) = s.overlay.as_mut() {
                        overlay.progress = progress;
                    }
                });
            }
        } else {
            self.status.send_modify(|s| {
                if let Some(overlay) = s.overlay.as_mut() {
                    overlay.progress = 100;
                }
            });
        }

        let path = self.sequencer()?.prepare_commit()?;
        let timeout = self.pacing.overlay_timeout();
        let routed = match tokio::time::timeout(timeout, self.router.navigate(&path)).await {
            Ok(result) => result,
            Err(_) => Err(RouteError::Timeout(self.pacing.overlay_timeout_ms)),
        };

        match routed {
            Ok(()) => {
                self.sequencer()?.commit(&path)?;
                self.sync_phase()?;
                self.status.send_modify(|s| s.overlay = None);
                Ok(TurnOutcome::Navigated { path })
            }
            Err(route_error) => {
                warn!(%path, "Route change failed: {}", route_error);
                Err(AssistantError::Route(route_error))
            }
        }
    }

    /// Turn a failed sequence into an error bubble with the sequencer back
    /// in `Idle` and the overlay dismissed. Cancellation passes through: the
    /// durable records stay for the next mount to recover.
    fn roll_back_on_failure(
        &self,
        result: AssistantResult<TurnOutcome>,
    ) -> AssistantResult<TurnOutcome> {
        let cause = match result {
            Err(AssistantError::Cancelled) => return Err(AssistantError::Cancelled),
            Err(cause) => cause,
            ok => return ok,
        };

        error!("Navigation sequence failed: {}", cause);
        let rolled_back = self.sequencer().and_then(|mut sequencer| sequencer.abort());
        self.status.send_modify(|s| s.overlay = None);
        self.sync_phase()?;
        if let Err(e) = rolled_back {
            warn!("Navigation rollback incomplete: {}", e);
        }
        self.append_error(&cause)
    }

    /// `Resumed → Idle`, appending each deferred response after the delay
    async fn deliver_deferred(&self) -> AssistantResult<TurnOutcome> {
        let deferred = match self.sequencer()?.phase() {
            NavPhase::Resumed { deferred } => deferred.clone(),
            _ => Vec::new(),
        };
        self.sync_phase()?;

        if deferred.is_empty() {
            self.sequencer()?.settle()?;
            self.sync_phase()?;
            return Ok(TurnOutcome::Ignored);
        }

        // Settle even when the delay is cancelled; the flags are gone already.
        let waited = self.lifetime.sleep(self.pacing.resume_delay()).await;
        self.sequencer()?.settle()?;
        self.sync_phase()?;
        waited?;

        let mut delivered = Vec::with_capacity(deferred.len());
        {
            let mut conversation = self.conversation()?;
            for kind in deferred {
                debug!(?kind, "Delivering deferred response");
                delivered.push(conversation.append(deferred_message(kind))?.clone());
            }
        }
        self.open();
        Ok(TurnOutcome::Replied(delivered))
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}
