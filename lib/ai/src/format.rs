//! Reply normalization.
//!
//! Turns a [`CompletionOutcome`] into the text sent back to the user: trimmed,
//! capped at a character limit, and never empty.

use crate::client::CompletionOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix appended to clipped replies.
pub const TRUNCATION_MARKER: &str = "...";

/// Canned replies used in place of provider output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackReplies {
    /// The provider answered with nothing usable.
    pub empty: String,
    /// The provider did not answer in time.
    pub timeout: String,
    /// The provider failed, or dispatch hit an internal fault.
    pub failure: String,
}

impl Default for FallbackReplies {
    fn default() -> Self {
        Self {
            empty: "Sorry, I didn't get a valid reply.".to_string(),
            timeout: "The reply timed out, please try again later.".to_string(),
            failure: "Sorry, I can't process your request right now, please try again later."
                .to_string(),
        }
    }
}

impl FallbackReplies {
    /// The canned text for a fallback source. Completions map to the
    /// generic failure text.
    #[must_use]
    pub fn text_for(&self, source: ReplySource) -> &str {
        match source {
            ReplySource::EmptyFallback => &self.empty,
            ReplySource::TimeoutFallback => &self.timeout,
            ReplySource::Completion | ReplySource::FailureFallback => &self.failure,
        }
    }
}

/// Where a formatted reply's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    /// Provider text, possibly truncated.
    Completion,
    /// The provider returned only whitespace.
    EmptyFallback,
    /// The provider timed out.
    TimeoutFallback,
    /// The provider failed.
    FailureFallback,
}

/// Final reply text: non-empty and within the configured length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedReply {
    text: String,
    source: ReplySource,
    truncated: bool,
}

impl FormattedReply {
    /// Returns the reply text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consumes the reply, returning its text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }

    /// Returns where the text came from.
    #[must_use]
    pub fn source(&self) -> ReplySource {
        self.source
    }

    /// Returns true if the text is provider output rather than a fallback.
    #[must_use]
    pub fn is_completion(&self) -> bool {
        self.source == ReplySource::Completion
    }

    /// Returns true if provider output was clipped.
    #[must_use]
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }
}

impl fmt::Display for FormattedReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Normalizes completion outcomes into user-facing replies.
#[derive(Debug, Clone)]
pub struct ResponseFormatter {
    max_length: usize,
    fallbacks: FallbackReplies,
}

impl ResponseFormatter {
    /// Creates a formatter capping replies at `max_length` characters.
    ///
    /// A limit of zero is raised to one so replies can stay non-empty.
    #[must_use]
    pub fn new(max_length: usize, fallbacks: FallbackReplies) -> Self {
        Self {
            max_length: max_length.max(1),
            fallbacks,
        }
    }

    /// Returns the character limit.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Returns the canned replies.
    #[must_use]
    pub fn fallbacks(&self) -> &FallbackReplies {
        &self.fallbacks
    }

    /// Formats an outcome.
    ///
    /// Lengths are counted in characters, not bytes.
    #[must_use]
    pub fn format(&self, outcome: &CompletionOutcome) -> FormattedReply {
        match outcome {
            CompletionOutcome::Success(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    self.fallback(ReplySource::EmptyFallback)
                } else {
                    let (text, truncated) = truncate(trimmed, self.max_length);
                    FormattedReply {
                        text,
                        source: ReplySource::Completion,
                        truncated,
                    }
                }
            }
            CompletionOutcome::Timeout => {
                self.fallback(ReplySource::TimeoutFallback)
            }
            CompletionOutcome::ProviderError(_) => self.failure(),
        }
    }

    /// The generic failure reply, also used for dispatch faults.
    #[must_use]
    pub fn failure(&self) -> FormattedReply {
        self.fallback(ReplySource::FailureFallback)
    }

    /// Clips arbitrary text (help and notice replies) to the same limit.
    #[must_use]
    pub fn clip(&self, text: &str) -> String {
        truncate(text, self.max_length).0
    }

    fn fallback(&self, source: ReplySource) -> FormattedReply {
        let configured = self.fallbacks.text_for(source);
        let (text, truncated) = if configured.trim().is_empty() {
            truncate(FallbackReplies::default().text_for(source), self.max_length)
        } else {
            truncate(configured, self.max_length)
        };
        FormattedReply {
            text,
            source,
            truncated,
        }
    }
}

/// Clips `text` to `max_length` characters, ending clipped text with
/// [`TRUNCATION_MARKER`]. Limits too small for the marker cut without it.
///
/// Returns the text and whether it was clipped.
#[must_use]
pub fn truncate(text: &str, max_length: usize) -> (String, bool) {
    if text.chars().count() <= max_length {
        return (text.to_string(), false);
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_length <= marker_len {
        return (text.chars().take(max_length).collect(), true);
    }

    let mut clipped: String = text.chars().take(max_length - marker_len).collect();
    clipped.push_str(TRUNCATION_MARKER);
    (clipped, true)
}
