//! OpenAI-compatible chat-completions client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{build_turns, ChatTurn, CompletionClient};
use crate::config::CompletionConfig;
use crate::conversation::Message;
use crate::error::{AssistantError, AssistantResult};

/// Request body
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Non-2xx payload: `{"error": {"message": "..."}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Chat-completions client with bearer authentication
#[derive(Debug, Clone)]
pub struct OpenAiCompletionClient {
    config: CompletionConfig,
    client: reqwest::Client,
}

impl OpenAiCompletionClient {
    /// Create a client. A missing API key is reported on the first call, not
    /// here, so the chat surface can still mount.
    pub fn new(config: CompletionConfig) -> AssistantResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AssistantError::configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn api_key(&self) -> AssistantResult<&str> {
        let key = self.config.api_key.trim();
        if key.is_empty() {
            return Err(AssistantError::configuration(
                "no completion API key configured (set COMPLETION_API_KEY)",
            ));
        }
        Ok(key)
    }
}

/// Pull the human-readable message out of an error body, falling back to the
/// raw text.
fn upstream_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty error response".to_string(),
        Err(_) => body.chars().take(300).collect(),
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, history: &[Message], latest: &str) -> AssistantResult<String> {
        let api_key = self.api_key()?;
        let request = ChatRequest {
            model: &self.config.model,
            messages: build_turns(history, latest),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        debug!(
            model = %self.config.model,
            turns = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistantError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = upstream_message(&body);
            warn!(status = status.as_u16(), %message, "Completion request failed");
            return Err(AssistantError::upstream(status.as_u16(), message));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::transport(format!("unreadable completion: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AssistantError::transport("completion returned no choices"))?;

        info!(chars = content.len(), "Completion received");
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
