//! Inbound message interface.
//!
//! Transports adapt their platform message objects to [`InboundMessage`];
//! the dispatcher sees nothing else of the platform.

use chatrelay_core::UserId;
use serde::{Deserialize, Serialize};

/// How a message reached the bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A group message addressing the bot.
    #[default]
    Mention,
    /// A one-to-one message.
    Direct,
}

/// What the dispatcher needs from a transport message.
pub trait InboundMessage: Send + Sync {
    /// Raw text, including any addressing tokens.
    fn text(&self) -> &str;

    /// Conversation key for the sender.
    fn user_id(&self) -> &UserId;

    /// The bot's own identity as the transport reports it.
    fn bot_self_token(&self) -> &str;

    /// How the message arrived.
    fn kind(&self) -> MessageKind {
        MessageKind::Mention
    }
}

/// Owned inbound message, for transports without a native message type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Raw text.
    pub text: String,
    /// Sender.
    pub user_id: UserId,
    /// The bot's own identity.
    pub bot_self_token: String,
    /// How the message arrived.
    #[serde(default)]
    pub kind: MessageKind,
}

impl InboundEvent {
    /// Creates a group mention event.
    #[must_use]
    pub fn mention(
        user_id: impl Into<UserId>,
        bot_self_token: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            user_id: user_id.into(),
            bot_self_token: bot_self_token.into(),
            kind: MessageKind::Mention,
        }
    }

    /// Creates a direct message event.
    #[must_use]
    pub fn direct(
        user_id: impl Into<UserId>,
        bot_self_token: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            kind: MessageKind::Direct,
            ..Self::mention(user_id, bot_self_token, text)
        }
    }
}

impl InboundMessage for InboundEvent {
    fn text(&self) -> &str {
        &self.text
    }

    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn bot_self_token(&self) -> &str {
        &self.bot_self_token
    }

    fn kind(&self) -> MessageKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind() {
        assert_eq!(InboundEvent::mention("u1", "42", "hi").kind(), MessageKind::Mention);
        assert_eq!(InboundEvent::direct("u1", "42", "hi").kind(), MessageKind::Direct);
    }

    #[test]
    fn event_exposes_fields_through_trait() {
        let event = InboundEvent::direct("u1", "42", "<@!42> hi");
        let message: &dyn InboundMessage = &event;

        assert_eq!(message.text(), "<@!42> hi");
        assert_eq!(message.user_id().as_str(), "u1");
        assert_eq!(message.bot_self_token(), "42");
    }
}
