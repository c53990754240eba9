//! Text-to-speech client and audio output seam

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SpeechConfig;
use crate::error::{AssistantError, AssistantResult};

/// Synthesized audio, not yet playable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Handle to a loaded, playable resource. Must be handed back to
/// [`AudioOutput::release`] once playback ends or is abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaybackHandle(Uuid);

impl PlaybackHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl Default for PlaybackHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
pub trait SpeechClient: Send + Sync {
    async fn synthesize(&self, text: &str) -> AssistantResult<AudioClip>;
}

/// Where narration is played
pub trait AudioOutput: Send + Sync {
    /// Turn a clip into a playable resource
    fn load(&self, clip: AudioClip) -> AssistantResult<PlaybackHandle>;

    fn play(&self, handle: &PlaybackHandle) -> AssistantResult<()>;

    fn stop(&self, handle: &PlaybackHandle);

    /// Revoke the resource; the handle is invalid afterwards
    fn release(&self, handle: PlaybackHandle);
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// ElevenLabs-style text-to-speech client
#[derive(Debug, Clone)]
pub struct ElevenLabsSpeechClient {
    config: SpeechConfig,
    client: reqwest::Client,
}

impl ElevenLabsSpeechClient {
    pub fn new(config: SpeechConfig) -> AssistantResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AssistantError::configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn url(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id
        )
    }
}

#[async_trait]
impl SpeechClient for ElevenLabsSpeechClient {
    async fn synthesize(&self, text: &str) -> AssistantResult<AudioClip> {
        if self.config.api_key.trim().is_empty() {
            return Err(AssistantError::configuration(
                "no text-to-speech API key configured (set TTS_API_KEY)",
            ));
        }

        let request = SpeechRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings {
                stability: self.config.stability,
                similarity_boost: self.config.similarity_boost,
            },
        };

        let response = self
            .client
            .post(self.url())
            .header("xi-api-key", self.config.api_key.trim())
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Speech request failed");
            return Err(AssistantError::upstream(status.as_u16(), body));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let bytes = response.bytes().await?.to_vec();
        debug!(bytes = bytes.len(), "Speech synthesized");

        Ok(AudioClip {
            bytes,
            content_type,
        })
    }
}

/// In-process audio output that tracks resources instead of playing sound.
///
/// Useful for headless front ends and for asserting that every loaded clip
/// gets released.
#[derive(Debug, Default)]
pub struct MemoryAudioOutput {
    inner: Mutex<OutputState>,
}

#[derive(Debug, Default)]
struct OutputState {
    live: HashSet<PlaybackHandle>,
    playing: Option<PlaybackHandle>,
    loaded_total: usize,
}

impl MemoryAudioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resources loaded and not yet released
    pub fn live_count(&self) -> usize {
        self.inner.lock().map(|s| s.live.len()).unwrap_or(0)
    }

    pub fn loaded_total(&self) -> usize {
        self.inner.lock().map(|s| s.loaded_total).unwrap_or(0)
    }

    pub fn playing(&self) -> Option<PlaybackHandle> {
        self.inner.lock().ok().and_then(|s| s.playing.clone())
    }
}

impl AudioOutput for MemoryAudioOutput {
    fn load(&self, _clip: AudioClip) -> AssistantResult<PlaybackHandle> {
        let handle = PlaybackHandle::new();
        let mut state = self
            .inner
            .lock()
            .map_err(|_| AssistantError::storage("audio output lock poisoned"))?;
        state.live.insert(handle.clone());
        state.loaded_total += 1;
        Ok(handle)
    }

    fn play(&self, handle: &PlaybackHandle) -> AssistantResult<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| AssistantError::storage("audio output lock poisoned"))?;
        if !state.live.contains(handle) {
            return Err(AssistantError::storage("playing a released audio resource"));
        }
        state.playing = Some(handle.clone());
        Ok(())
    }

    fn stop(&self, handle: &PlaybackHandle) {
        if let Ok(mut state) = self.inner.lock() {
            if state.playing.as_ref() == Some(handle) {
                state.playing = None;
            }
        }
    }

    fn release(&self, handle: PlaybackHandle) {
        if let Ok(mut state) = self.inner.lock() {
            if state.playing.as_ref() == Some(&handle) {
                state.playing = None;
            }
            state.live.remove(&handle);
        }
    }
}
