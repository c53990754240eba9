//! Assistant configuration
//!
//! Built from defaults, then an optional YAML file, then environment
//! variables (secrets are expected to come from the environment only).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AssistantError, AssistantResult};
use crate::storage::DEFAULT_STAGE;

/// Default chat-completions endpoint
pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default completion model
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";

/// Default text-to-speech API base
pub const DEFAULT_SPEECH_BASE_URL: &str = "https://api.elevenlabs.io";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Bearer credential; empty means "not configured"
    #[serde(skip_serializing)]
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_COMPLETION_ENDPOINT.to_string(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub base_url: String,
    pub voice_id: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub timeout_seconds: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_SPEECH_BASE_URL.to_string(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            model_id: "eleven_monolingual_v1".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            timeout_seconds: 30,
        }
    }
}

/// Pacing of the scripted and navigation sequences, in milliseconds.
///
/// These are UX parameters; zero is valid everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Reading time between the navigation message and the overlay
    pub message_delay_ms: u64,
    /// How long the overlay animates before the route change
    pub overlay_duration_ms: u64,
    /// Overlay animation step
    pub overlay_tick_ms: u64,
    /// Upper bound on the router call before the overlay is dismissed
    pub overlay_timeout_ms: u64,
    /// Delay before deferred responses appear after a remount
    pub resume_delay_ms: u64,
    /// Delay before a scripted reply follows a button click
    pub scripted_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            message_delay_ms: 1500,
            overlay_duration_ms: 1000,
            overlay_tick_ms: 100,
            overlay_timeout_ms: 5000,
            resume_delay_ms: 800,
            scripted_delay_ms: 600,
        }
    }
}

impl PacingConfig {
    /// No delays at all
    pub fn immediate() -> Self {
        Self {
            message_delay_ms: 0,
            overlay_duration_ms: 0,
            overlay_tick_ms: 0,
            overlay_timeout_ms: 5000,
            resume_delay_ms: 0,
            scripted_delay_ms: 0,
        }
    }

    pub fn message_delay(&self) -> Duration {
        Duration::from_millis(self.message_delay_ms)
    }

    pub fn overlay_duration(&self) -> Duration {
        Duration::from_millis(self.overlay_duration_ms)
    }

    pub fn overlay_tick(&self) -> Duration {
        Duration::from_millis(self.overlay_tick_ms)
    }

    pub fn overlay_timeout(&self) -> Duration {
        Duration::from_millis(self.overlay_timeout_ms)
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }

    pub fn scripted_delay(&self) -> Duration {
        Duration::from_millis(self.scripted_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub completion: CompletionConfig,
    pub speech: SpeechConfig,
    pub pacing: PacingConfig,
    /// Stage used when the durable preference is absent
    pub default_stage: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            completion: CompletionConfig::default(),
            speech: SpeechConfig::default(),
            pacing: PacingConfig::default(),
            default_stage: DEFAULT_STAGE.to_string(),
        }
    }
}

impl AssistantConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load a YAML file, then apply environment overrides
    pub fn from_yaml_file(path: impl AsRef<Path>) -> AssistantResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_yaml_str(&raw)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> AssistantResult<Self> {
        serde_yaml::from_str(raw)
            .map_err(|e| AssistantError::configuration(format!("invalid config file: {}", e)))
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production, a map in tests)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("COMPLETION_API_KEY") {
            self.completion.api_key = v;
        }
        if let Some(v) = get("COMPLETION_ENDPOINT") {
            self.completion.endpoint = v;
        }
        if let Some(v) = get("COMPLETION_MODEL") {
            self.completion.model = v;
        }
        if let Some(v) = get("TTS_API_KEY") {
            self.speech.api_key = v;
        }
        if let Some(v) = get("TTS_BASE_URL") {
            self.speech.base_url = v;
        }
        if let Some(v) = get("TTS_VOICE_ID") {
            self.speech.voice_id = v;
        }
        if let Some(v) = get("TTS_MODEL_ID") {
            self.speech.model_id = v;
        }
        if let Some(v) = get("ASSISTANT_STAGE") {
            self.default_stage = v;
        }
    }
}
