//! Bounded completion calls.
//!
//! `CompletionClient` issues exactly one backend request per call and never
//! waits past the caller's deadline. Every failure is folded into a
//! [`CompletionOutcome`] value; nothing here returns `Err`.

use crate::backend::{ChatBackend, CompletionRequest, CompletionSettings};
use chatrelay_conversation::Turn;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of one completion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The provider returned text (possibly empty).
    Success(String),
    /// No response arrived before the deadline.
    Timeout,
    /// The provider failed. The detail is for logs only.
    ProviderError(String),
}

impl CompletionOutcome {
    /// Returns true for [`CompletionOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Short label used in log fields.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Timeout => "timeout",
            Self::ProviderError(_) => "provider_error",
        }
    }
}

/// Wraps a [`ChatBackend`] with a per-call deadline.
///
/// Cheap to clone; the backend is shared.
#[derive(Clone)]
pub struct CompletionClient {
    backend: Arc<dyn ChatBackend>,
    settings: CompletionSettings,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("backend", &self.backend.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl CompletionClient {
    /// Creates a client sending requests built from `settings` to `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>, settings: CompletionSettings) -> Self {
        Self { backend, settings }
    }

    /// Returns the provider settings applied to new requests.
    #[must_use]
    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    /// Builds a request for `messages` using this client's settings.
    #[must_use]
    pub fn request(&self, messages: Vec<Turn>) -> CompletionRequest {
        CompletionRequest::new(messages, &self.settings)
    }

    /// Sends `request` and waits at most `timeout` for the reply.
    ///
    /// When the deadline passes the in-flight backend future is dropped, which
    /// abandons the HTTP request rather than awaiting it.
    pub async fn complete(&self, request: &CompletionRequest, timeout: Duration) -> CompletionOutcome {
        let started = Instant::now();
        let backend = self.backend.name();

        match tokio::time::timeout(timeout, self.backend.complete(request)).await {
            Ok(Ok(completion)) => {
                debug!(
                    backend,
                    elapsed_ms = elapsed_ms(started),
                    output_tokens = completion.usage.output_tokens,
                    "completion received"
                );
                CompletionOutcome::Success(completion.content)
            }
            Ok(Err(e)) => {
                warn!(
                    backend,
                    elapsed_ms = elapsed_ms(started),
                    error = %e,
                    "completion failed"
                );
                CompletionOutcome::ProviderError(e.to_string())
            }
            Err(_) => {
                warn!(
                    backend,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "completion timed out"
                );
                CompletionOutcome::Timeout
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
