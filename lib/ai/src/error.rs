//! Error types for the AI crate.
//!
//! Backends report failures as `LlmError`. The completion client folds every
//! variant into `CompletionOutcome::ProviderError`, so these never reach an
//! end user verbatim.

use std::fmt;

/// Errors from LLM backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// The request could not be sent or the connection failed.
    RequestFailed { reason: String },
    /// The provider answered with a non-success HTTP status.
    ProviderRejected { status: u16, message: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// The provider returned an empty choice list.
    NoChoices,
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { reason } => {
                write!(f, "LLM request failed: {reason}")
            }
            Self::ProviderRejected { status, message } => {
                write!(f, "LLM provider returned HTTP {status}: {message}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::NoChoices => write!(f, "no choices returned"),
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_error_display() {
        let err = LlmError::ProviderRejected {
            status: 429,
            message: "slow down".to_string(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("slow down"));
    }

    #[test]
    fn no_choices_display() {
        assert_eq!(LlmError::NoChoices.to_string(), "no choices returned");
    }

    #[test]
    fn invalid_config_display() {
        let err = LlmError::InvalidConfig {
            reason: "empty model".to_string(),
        };
        assert!(err.to_string().contains("empty model"));
    }
}
