//! Slide narration driver
//!
//! Keeps at most one audio resource alive. Each request bumps a generation
//! counter: the current clip is stopped and released before the fetch starts,
//! and a fetch that returns for an older generation is dropped unplayed.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::speech::{AudioOutput, PlaybackHandle, SpeechClient};
use crate::error::{AssistantError, AssistantResult};
use crate::session::Lifetime;
use crate::storage::DurableState;

/// Independently observable narration flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct NarrationStatus {
    pub loading: bool,
    pub playing: bool,
    pub muted: bool,
}

impl NarrationStatus {
    pub fn is_idle(&self) -> bool {
        !self.loading && !self.playing
    }
}

/// Result of a narration request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationOutcome {
    Playing(PlaybackHandle),
    /// Muted; nothing was fetched
    Muted,
    /// A newer request (or a stop) arrived while this one was fetching
    Superseded,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    current: Option<PlaybackHandle>,
}

pub struct NarrationDriver {
    speech: Arc<dyn SpeechClient>,
    output: Arc<dyn AudioOutput>,
    state: DurableState,
    user: String,
    slot: Mutex<Slot>,
    status: watch::Sender<NarrationStatus>,
    lifetime: Lifetime,
}

impl NarrationDriver {
    pub fn new(
        speech: Arc<dyn SpeechClient>,
        output: Arc<dyn AudioOutput>,
        state: DurableState,
        user: impl Into<String>,
    ) -> AssistantResult<Self> {
        let user = user.into();
        let muted = state.audio_muted(&user)?;
        let (status, _) = watch::channel(NarrationStatus {
            muted,
            ..NarrationStatus::default()
        });
        Ok(Self {
            speech,
            output,
            state,
            user,
            slot: Mutex::new(Slot::default()),
            status,
            lifetime: Lifetime::new(),
        })
    }

    pub fn status(&self) -> watch::Receiver<NarrationStatus> {
        self.status.subscribe()
    }

    pub fn snapshot(&self) -> NarrationStatus {
        *self.status.borrow()
    }

    pub fn is_muted(&self) -> bool {
        self.snapshot().muted
    }

    fn slot(&self) -> AssistantResult<MutexGuard<'_, Slot>> {
        self.slot
            .lock()
            .map_err(|_| AssistantError::storage("narration lock poisoned"))
    }

    /// Stop and release the current clip and invalidate in-flight fetches.
    /// Returns the new generation.
    fn stop_locked(&self, slot: &mut Slot) -> u64 {
        if let Some(handle) = slot.current.take() {
            debug!(clip = %handle.id(), "Stopping narration");
            self.output.stop(&handle);
            self.output.release(handle);
        }
        slot.generation += 1;
        slot.generation
    }

    /// Narrate `text`, replacing whatever is playing or loading
    pub async fn narrate(&self, text: &str) -> AssistantResult<NarrationOutcome> {
        let generation = {
            let mut slot = self.slot()?;
            self.stop_locked(&mut slot)
        };

        if self.is_muted() {
            self.status.send_modify(|s| {
                s.loading = false;
                s.playing = false;
            });
            return Ok(NarrationOutcome::Muted);
        }

        self.status.send_modify(|s| {
            s.loading = true;
            s.playing = false;
        });

        let fetched = self.lifetime.run(self.speech.synthesize(text)).await;

        let mut slot = self.slot()?;
        if slot.generation != generation {
            debug!(generation, "Discarding superseded narration");
            return Ok(NarrationOutcome::Superseded);
        }

        let clip = match fetched {
            Ok(Ok(clip)) => clip,
            Ok(Err(e)) | Err(e) => {
                self.status.send_modify(|s| s.loading = false);
                warn!("Narration failed: {}", e);
                return Err(e);
            }
        };

        let handle = match self.output.load(clip) {
            Ok(handle) => handle,
            Err(e) => {
                self.status.send_modify(|s| s.loading = false);
                warn!("Narration clip could not be loaded: {}", e);
                return Err(e);
            }
        };
        if let Err(e) = self.output.play(&handle) {
            self.output.release(handle);
            self.status.send_modify(|s| s.loading = false);
            return Err(e);
        }
        slot.current = Some(handle.clone());
        self.status.send_modify(|s| {
            s.loading = false;
            s.playing = true;
        });
        Ok(NarrationOutcome::Playing(handle))
    }

    /// Stop playback and drop any in-flight fetch result
    pub fn stop(&self) -> AssistantResult<()> {
        {
            let mut slot = self.slot()?;
            self.stop_locked(&mut slot);
        }
        self.status.send_modify(|s| {
            s.loading = false;
            s.playing = false;
        });
        Ok(())
    }

    /// The output reports a clip reached its end
    pub fn playback_finished(&self, handle: &PlaybackHandle) -> AssistantResult<()> {
        let mut slot = self.slot()?;
        if slot.current.as_ref() == Some(handle) {
            if let Some(handle) = slot.current.take() {
                self.output.release(handle);
            }
            self.status.send_modify(|s| s.playing = false);
        }
        Ok(())
    }

    /// Persist the user's mute preference; muting stops current audio
    pub fn set_muted(&self, muted: bool) -> AssistantResult<()> {
        self.state.set_audio_muted(&self.user, muted)?;
        info!(user = %self.user, muted, "Narration mute changed");
        if muted {
            self.stop()?;
        }
        self.status.send_modify(|s| s.muted = muted);
        Ok(())
    }

    /// Stop audio and reject any further fetch results
    pub fn shutdown(&self) -> AssistantResult<()> {
        self.lifetime.cancel();
        self.stop()
    }
}

impl Drop for NarrationDriver {
    fn drop(&mut self) {
        self.lifetime.cancel();
        if let Ok(mut slot) = self.slot.lock() {
            if let Some(handle) = slot.current.take() {
                self.output.stop(&handle);
                self.output.release(handle);
            }
        }
    }
}
