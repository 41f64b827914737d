//! Startup error types for the bot process.

use std::fmt;

/// Errors from loading and validating configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    Load { reason: String },
    /// A value is outside its allowed range.
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { reason } => write!(f, "failed to load configuration: {reason}"),
            Self::Invalid { field, reason } => {
                write!(f, "invalid configuration value '{field}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors from assembling the dispatch pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// The completion backend could not be constructed.
    Backend { reason: String },
    /// The dispatcher rejected its configuration.
    Dispatcher { reason: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend { reason } => write!(f, "failed to create completion backend: {reason}"),
            Self::Dispatcher { reason } => write!(f, "failed to create dispatcher: {reason}"),
        }
    }
}

impl std::error::Error for StartupError {}
