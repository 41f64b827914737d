//! LLM backend abstraction.
//!
//! A `ChatBackend` performs exactly one chat-completion round trip. Timeouts
//! and fallback policy are layered on top by the completion client, so
//! backends stay thin and are easy to replace with test doubles.

use crate::error::LlmError;
use async_trait::async_trait;
use chatrelay_conversation::Turn;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Provider parameters applied to every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSettings {
    /// Target model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum number of output tokens.
    pub max_tokens: u32,
}

impl CompletionSettings {
    /// Creates settings for the given model with default sampling parameters.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the max tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A single chat-completion request.
///
/// Built fresh for each inbound message and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    model: String,
    messages: Vec<Turn>,
    max_tokens: u32,
    temperature: f32,
}

impl CompletionRequest {
    /// Creates a request for `messages` using the given provider settings.
    #[must_use]
    pub fn new(messages: Vec<Turn>, settings: &CompletionSettings) -> Self {
        Self {
            model: settings.model.clone(),
            messages,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }

    /// Returns the target model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the ordered conversation turns.
    #[must_use]
    pub fn messages(&self) -> &[Turn] {
        &self.messages
    }

    /// Returns the maximum number of output tokens.
    #[must_use]
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Returns the sampling temperature.
    #[must_use]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens.
    pub input_tokens: u32,
    /// Number of output tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Returns the total number of tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// The first choice of a successful completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletion {
    /// Raw generated text. Empty when the provider sent no content.
    pub content: String,
    /// Model that produced the reply, if reported.
    pub model: Option<String>,
    /// Token usage statistics, if reported.
    pub usage: TokenUsage,
}

impl ChatCompletion {
    /// Creates a completion with the given text and no metadata.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
            usage: TokenUsage::default(),
        }
    }
}

/// Trait for chat-completion backends.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends the request and returns the first choice.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a rejected request, an
    /// unparsable response, or an empty choice list.
    async fn complete(&self, request: &CompletionRequest) -> Result<ChatCompletion, LlmError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// A backend that returns a canned result, optionally after a delay.
///
/// Counts the requests it receives so callers can assert on provider traffic.
#[derive(Debug)]
pub struct MockBackend {
    result: Result<ChatCompletion, LlmError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockBackend {
    /// Creates a mock backend that succeeds with the given text.
    #[must_use]
    pub fn succeeding(content: impl Into<String>) -> Self {
        Self {
            result: Ok(ChatCompletion::text(content)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a mock backend that fails with the given error.
    #[must_use]
    pub fn failing(error: LlmError) -> Self {
        Self {
            result: Err(error),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Delays every response by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn complete(&self, _request: &CompletionRequest) -> Result<ChatCompletion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }

    fn name(&self) -> &str {
        "mock"
    }
}
