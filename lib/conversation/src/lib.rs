//! Conversation state for chatrelay.
//!
//! This crate provides:
//!
//! - **Turns**: Role-tagged message units
//! - **Conversation Store**: Bounded in-memory history per user
//! - **Prompt Builder**: Ordered turn sequence submitted to the provider

pub mod message;
pub mod prompt;
pub mod store;

pub use message::{Role, Turn};
pub use prompt::PromptBuilder;
pub use store::ConversationStore;
