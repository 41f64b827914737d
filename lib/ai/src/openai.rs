//! OpenAI-compatible chat completion backend (`/chat/completions`).
//!
//! Wire types are private to this module. The backend is stateless and one
//! call is one HTTP round trip; deadlines are enforced by the caller.

use crate::backend::{ChatBackend, ChatCompletion, CompletionRequest, TokenUsage};
use crate::error::LlmError;
use async_trait::async_trait;
use chatrelay_conversation::Turn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Backend for any HTTP endpoint implementing the OpenAI chat API.
///
/// `reqwest::Client` is reference counted internally, so clones share the
/// connection pool.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiBackend {
    /// Creates a backend for `base_url` (e.g. `https://api.openai.com/v1`).
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is empty or the HTTP client cannot be
    /// built.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, LlmError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "provider base URL is empty".to_string(),
            });
        }

        let client = Client::builder()
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{base_url}/chat/completions"),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    /// Returns the full completions endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    #[instrument(skip_all, fields(model = %request.model(), turns = request.messages().len()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<ChatCompletion, LlmError> {
        let payload = ChatCompletionRequest {
            model: request.model(),
            messages: request.messages(),
            max_tokens: request.max_tokens(),
            temperature: request.temperature(),
            stream: false,
        };

        let mut req = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| LlmError::RequestFailed {
            reason: e.to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| LlmError::RequestFailed {
            reason: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(LlmError::ProviderRejected {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::ResponseParseFailed {
                reason: e.to_string(),
            })?;

        debug!(choices = parsed.choices.len(), "received completion");

        let choice = parsed.choices.into_iter().next().ok_or(LlmError::NoChoices)?;

        Ok(ChatCompletion {
            content: choice.message.content.unwrap_or_default(),
            model: parsed.model,
            usage: parsed
                .usage
                .map(|u| TokenUsage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default(),
        })
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

/// Extracts the provider's message from an error body, falling back to the
/// raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "<empty body>".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
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

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
