//! Chat completion providers.
//!
//! [`OpenAiClient`] talks to any OpenAI-compatible `/chat/completions`
//! endpoint. Every provider failure surfaces as an `External` error so the
//! caller sees a 502 rather than a 500.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kairos_config::AiSection;
use kairos_core::{KairosError, KairosResult};
use serde::{Deserialize, Serialize};

/// Service name attached to provider errors.
pub const PROVIDER_NAME: &str = "openai";

/// Message returned when no API key is configured.
pub const NOT_CONFIGURED: &str = "AI provider is not configured";

/// Produces a completion for a system and user prompt.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the assistant's reply text.
    async fn complete(&self, system: &str, prompt: &str) -> KairosResult<String>;
}

/// Builds the provider described by the AI section: an [`OpenAiClient`] when
/// an API key is set, otherwise [`Unconfigured`].
pub fn provider_from_config(ai: &AiSection) -> KairosResult<Arc<dyn CompletionProvider>> {
    match ai.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => Ok(Arc::new(OpenAiClient::new(
            &ai.endpoint,
            key,
            &ai.model,
            Duration::from_millis(ai.timeout_ms),
        )?)),
        None => Ok(Arc::new(Unconfigured)),
    }
}

/// Provider used when no API key is set. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl CompletionProvider for Unconfigured {
    async fn complete(&self, _system: &str, _prompt: &str) -> KairosResult<String> {
        Err(KairosError::external(NOT_CONFIGURED, Some(PROVIDER_NAME)))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions API.
pub struct OpenAiClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// Creates a client. `endpoint` is the API base, e.g.
    /// `https://api.openai.com/v1`.
    pub fn new(endpoint: &str, api_key: &str, model: &str, timeout: Duration) -> KairosResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KairosError::internal_with_source("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            url: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn external(message: impl Into<String>) -> KairosError {
        KairosError::external(message, Some(PROVIDER_NAME))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str) -> KairosResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Self::external("AI provider timed out")
                } else {
                    Self::external(format!("AI provider unreachable: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "AI provider rejected request");
            return Err(Self::external(format!("AI provider returned HTTP {}", status.as_u16())));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Self::external(format!("invalid AI provider response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Self::external("AI provider returned no content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairos_core::ErrorCategory;

    #[tokio::test]
    async fn test_unconfigured_is_external() {
        let err = Unconfigured.complete("s", "p").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::External);
        assert_eq!(err.to_string(), NOT_CONFIGURED);
    }

    #[test]
    fn test_provider_selection() {
        let mut ai = AiSection::default();
        assert!(provider_from_config(&ai).is_ok());

        ai.api_key = Some("sk-test".to_string());
        assert!(provider_from_config(&ai).is_ok());
    }

    #[test]
    fn test_url_is_joined_once() {
        let client = OpenAiClient::new("http://localhost:9/v1/", "k", "m", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url, "http://localhost:9/v1/chat/completions");
        assert!(!format!("{client:?}").contains("\"k\""));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_external() {
        let client = OpenAiClient::new("http://127.0.0.1:9/v1", "k", "m", Duration::from_millis(500)).unwrap();
        let err = client.complete("s", "p").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::External);
    }
}
