//! Completion primitives for chatrelay.
//!
//! This crate provides:
//!
//! - **Backend**: The `ChatBackend` seam and an OpenAI-compatible HTTP backend
//! - **Completion Client**: One bounded provider call per message, reported as
//!   a `CompletionOutcome` value instead of an error
//! - **Formatter**: Length-normalized replies with canned fallbacks

pub mod backend;
pub mod client;
pub mod error;
pub mod format;
pub mod openai;

pub use backend::{
    ChatBackend, ChatCompletion, CompletionRequest, CompletionSettings, MockBackend, TokenUsage,
};
pub use client::{CompletionClient, CompletionOutcome};
pub use error::LlmError;
pub use format::{FallbackReplies, FormattedReply, ReplySource, ResponseFormatter, TRUNCATION_MARKER};
pub use openai::OpenAiBackend;
