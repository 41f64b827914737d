//! Message dispatch for chatrelay.
//!
//! This crate provides:
//!
//! - **Inbound Messages**: The narrow interface transports implement
//! - **Addressing**: Removal of mention tokens aimed at the bot
//! - **Dispatcher**: Store read, prompt, bounded completion, formatting and
//!   history update for each inbound message

pub mod addressing;
pub mod dispatcher;
pub mod error;
pub mod event;

pub use addressing::{AddressStripper, AddressingSyntax};
pub use dispatcher::{DispatchReply, Dispatcher, DispatcherConfig, ReplyKind, ReplyTexts};
pub use error::DispatchError;
pub use event::{InboundEvent, InboundMessage, MessageKind};
