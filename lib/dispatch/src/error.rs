//! Error types for the dispatch crate.
//!
//! None of these reach the transport: the dispatcher logs them and answers
//! with the generic fallback reply.

use std::fmt;

/// Errors from dispatcher construction and message handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The addressing pattern is not a valid regular expression.
    InvalidAddressingPattern { pattern: String, reason: String },
    /// Invalid dispatcher configuration.
    InvalidConfig { reason: String },
    /// The inbound message carried no user identifier.
    MissingUserId,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddressingPattern { pattern, reason } => {
                write!(f, "invalid addressing pattern '{pattern}': {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid dispatcher configuration: {reason}")
            }
            Self::MissingUserId => write!(f, "inbound message has no user identifier"),
        }
    }
}

impl std::error::Error for DispatchError {}
