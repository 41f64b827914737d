//! Per-message dispatch.
//!
//! For each inbound message the dispatcher:
//! 1. Strips addressing tokens aimed at the bot
//! 2. Answers empty input with a help reply (history untouched)
//! 3. Handles the reset command
//! 4. Builds the prompt from stored history and calls the provider under the
//!    configured deadline
//! 5. Formats the outcome and records the exchange
//!
//! The user's turn is always recorded; the assistant's turn only when the
//! provider produced usable text, so apologies never leak into later prompts.
//! Errors and panics inside a dispatch unit become the generic fallback reply.

use crate::addressing::{AddressStripper, AddressingSyntax};
use crate::error::DispatchError;
use crate::event::{InboundMessage, MessageKind};
use chatrelay_ai::{CompletionClient, FallbackReplies, ReplySource, ResponseFormatter};
use chatrelay_conversation::{ConversationStore, PromptBuilder};
use chatrelay_core::DispatchId;
use futures::FutureExt;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Text of the command that clears a user's history.
pub const RESET_COMMAND: &str = "/reset";

/// Static replies that never involve the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyTexts {
    /// Help for a group mention with no question.
    pub mention_help: String,
    /// Help for an empty direct message.
    pub direct_help: String,
    /// Confirmation of the reset command.
    pub reset_done: String,
}

impl Default for ReplyTexts {
    fn default() -> Self {
        Self {
            mention_help: "Hi! Mention me with a question to get a reply.\n\
                           For example: @me what's the weather like today?"
                .to_string(),
            direct_help: "Hi! I'm an AI assistant, just send me a message to get a reply."
                .to_string(),
            reset_done: "Conversation cleared, let's start over.".to_string(),
        }
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Optional system instruction prefixed to every prompt.
    pub system_prompt: Option<String>,
    /// Deadline for each provider call.
    pub response_timeout: Duration,
    /// Maximum reply length in characters.
    pub max_message_length: usize,
    /// Mention syntax of the chat platform.
    pub addressing: AddressingSyntax,
    /// Help and notice texts.
    pub replies: ReplyTexts,
    /// Canned replies for failed completions.
    pub fallbacks: FallbackReplies,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            response_timeout: Duration::from_secs(30),
            max_message_length: 2000,
            addressing: AddressingSyntax::default(),
            replies: ReplyTexts::default(),
            fallbacks: FallbackReplies::default(),
        }
    }
}

/// What kind of reply a dispatch produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Help for an empty message.
    Help,
    /// Confirmation of a history reset.
    Reset,
    /// Provider output or one of its fallbacks.
    Formatted(ReplySource),
    /// Internal failure converted to the generic fallback.
    Fault,
}

/// Outbound text for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReply {
    text: String,
    kind: ReplyKind,
}

impl DispatchReply {
    /// Returns the reply text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consumes the reply, returning its text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }

    /// Returns the reply kind.
    #[must_use]
    pub fn kind(&self) -> ReplyKind {
        self.kind
    }
}

/// Routes inbound messages through history, provider and formatter.
#[derive(Debug)]
pub struct Dispatcher {
    store: Arc<ConversationStore>,
    client: CompletionClient,
    prompt: PromptBuilder,
    formatter: ResponseFormatter,
    addressing: AddressStripper,
    replies: ReplyTexts,
    response_timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher over a shared store and an injected client.
    ///
    /// # Errors
    ///
    /// Returns an error if the addressing pattern does not compile or the
    /// timeout or length limit is zero.
    pub fn new(
        config: DispatcherConfig,
        store: Arc<ConversationStore>,
        client: CompletionClient,
    ) -> Result<Self, Report<DispatchError>> {
        if config.response_timeout.is_zero() {
            return Err(DispatchError::InvalidConfig {
                reason: "response timeout must be greater than zero".to_string(),
            }
            .into());
        }
        if config.max_message_length == 0 {
            return Err(DispatchError::InvalidConfig {
                reason: "max message length must be greater than zero".to_string(),
            }
            .into());
        }

        let addressing = AddressStripper::new(&config.addressing)?;

        Ok(Self {
            store,
            client,
            prompt: PromptBuilder::new(config.system_prompt),
            formatter: ResponseFormatter::new(config.max_message_length, config.fallbacks),
            addressing,
            replies: config.replies,
            response_timeout: config.response_timeout,
        })
    }

    /// Returns the shared conversation store.
    #[must_use]
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Handles one inbound message and returns the reply to send.
    ///
    /// Never fails: internal errors and panics are logged and answered with
    /// the generic fallback.
    #[instrument(
        skip_all,
        fields(
            dispatch_id = %DispatchId::new(),
            user_id = %message.user_id(),
            kind = ?message.kind(),
        )
    )]
    pub async fn handle<M>(&self, message: &M) -> DispatchReply
    where
        M: InboundMessage + ?Sized,
    {
        match AssertUnwindSafe(self.try_handle(message)).catch_unwind().await {
            Ok(Ok(reply)) => reply,
            Ok(Err(report)) => {
                error!(error = %report, "dispatch failed");
                self.fault()
            }
            Err(panic) => {
                error!(panic = panic_message(panic.as_ref()), "dispatch panicked");
                self.fault()
            }
        }
    }

    async fn try_handle<M>(&self, message: &M) -> Result<DispatchReply, Report<DispatchError>>
    where
        M: InboundMessage + ?Sized,
    {
        let user_id = message.user_id();
        if user_id.is_empty() {
            return Err(DispatchError::MissingUserId.into());
        }

        let text = self.addressing.strip(message.text(), message.bot_self_token());
        debug!(text = %text, "message received");

        if text.is_empty() {
            let help = match message.kind() {
                MessageKind::Mention => &self.replies.mention_help,
                MessageKind::Direct => &self.replies.direct_help,
            };
            return Ok(self.notice(help, ReplyKind::Help));
        }

        if text.eq_ignore_ascii_case(RESET_COMMAND) {
            self.store.clear_conversation(user_id);
            info!("conversation reset by user");
            return Ok(self.notice(&self.replies.reset_done, ReplyKind::Reset));
        }

        let history = self.store.get_messages(user_id, None);
        let history_turns = history.len();
        let request = self.client.request(self.prompt.build(history, &text));

        let outcome = self.client.complete(&request, self.response_timeout).await;
        let reply = self.formatter.format(&outcome);

        let assistant_turn = reply.is_completion().then(|| reply.as_str().to_string());
        self.store.record_exchange(user_id, text, assistant_turn);

        info!(
            outcome = outcome.label(),
            history_turns,
            reply_chars = reply.as_str().chars().count(),
            truncated = reply.was_truncated(),
            "reply ready"
        );

        let kind = ReplyKind::Formatted(reply.source());
        Ok(DispatchReply {
            text: reply.into_text(),
            kind,
        })
    }

    fn notice(&self, text: &str, kind: ReplyKind) -> DispatchReply {
        DispatchReply {
            text: self.formatter.clip(text),
            kind,
        }
    }

    fn fault(&self) -> DispatchReply {
        DispatchReply {
            text: self.formatter.failure().into_text(),
            kind: ReplyKind::Fault,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::InboundEvent;
    use async_trait::async_trait;
    use chatrelay_ai::{
        ChatBackend, ChatCompletion, CompletionRequest, CompletionSettings, LlmError, MockBackend,
    };
    use chatrelay_conversation::Turn;
    use chatrelay_core::UserId;
    use std::sync::Mutex;

    const BOT: &str = "42";

    /// Records every request and answers with a fixed reply.
    #[derive(Default)]
    struct RecordingBackend {
        requests: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl ChatBackend for RecordingBackend {
        async fn complete(&self, request: &CompletionRequest) -> Result<ChatCompletion, LlmError> {
            let mut requests = self.requests.lock().expect("requests lock");
            requests.push(request.clone());
            Ok(ChatCompletion::text(format!("reply {}", requests.len())))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct PanickingBackend;

    #[async_trait]
    impl ChatBackend for PanickingBackend {
        async fn complete(&self, _request: &CompletionRequest) -> Result<ChatCompletion, LlmError> {
            panic!("backend exploded");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    fn dispatcher_with(backend: Arc<dyn ChatBackend>, config: DispatcherConfig) -> Dispatcher {
        let client = CompletionClient::new(backend, CompletionSettings::new("test-model"));
        Dispatcher::new(config, Arc::new(ConversationStore::new(5)), client)
            .expect("valid dispatcher")
    }

    fn dispatcher(backend: Arc<dyn ChatBackend>) -> Dispatcher {
        dispatcher_with(backend, DispatcherConfig::default())
    }

    fn history(dispatcher: &Dispatcher, user: &str) -> Vec<Turn> {
        dispatcher.store().get_messages(&UserId::from(user), None)
    }

    #[tokio::test]
    async fn successful_reply_is_returned_and_recorded() {
        let backend = Arc::new(MockBackend::succeeding("hi there"));
        let dispatcher = dispatcher(backend.clone());

        let reply = dispatcher
            .handle(&InboundEvent::mention("u1", BOT, "<@!42> hello"))
            .await;

        assert_eq!(reply.text(), "hi there");
        assert_eq!(reply.kind(), ReplyKind::Formatted(ReplySource::Completion));
        assert_eq!(
            history(&dispatcher, "u1"),
            vec![Turn::user("hello"), Turn::assistant("hi there")]
        );
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn token_only_message_gets_help_without_touching_history() {
        let backend = Arc::new(MockBackend::succeeding("unused"));
        let dispatcher = dispatcher(backend.clone());

        let reply = dispatcher.handle(&InboundEvent::mention("u1", BOT, "<@!42>")).await;

        assert_eq!(reply.kind(), ReplyKind::Help);
        assert_eq!(reply.text(), ReplyTexts::default().mention_help);
        assert!(history(&dispatcher, "u1").is_empty());
        assert_eq!(dispatcher.store().user_count(), 0);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn empty_direct_message_gets_direct_help() {
        let dispatcher = dispatcher(Arc::new(MockBackend::succeeding("unused")));

        let reply = dispatcher.handle(&InboundEvent::direct("u1", BOT, "   ")).await;

        assert_eq!(reply.text(), ReplyTexts::default().direct_help);
    }

    #[tokio::test]
    async fn provider_error_records_user_turn_only() {
        let backend = Arc::new(MockBackend::failing(LlmError::RequestFailed {
            reason: "connection reset by peer".to_string(),
        }));
        let dispatcher = dispatcher(backend);

        let reply = dispatcher.handle(&InboundEvent::mention("u1", BOT, "<@!42> hello")).await;

        assert_eq!(reply.text(), FallbackReplies::default().failure);
        assert!(!reply.text().contains("connection reset"));
        assert_eq!(history(&dispatcher, "u1"), vec![Turn::user("hello")]);
    }

    #[tokio::test]
    async fn timeout_returns_timeout_fallback() {
        let backend =
            Arc::new(MockBackend::succeeding("too late").with_delay(Duration::from_millis(500)));
        let config = DispatcherConfig {
            response_timeout: Duration::from_millis(50),
            ..DispatcherConfig::default()
        };
        let dispatcher = dispatcher_with(backend, config);

        let reply = dispatcher.handle(&InboundEvent::direct("u1", BOT, "hello")).await;

        assert_eq!(reply.text(), FallbackReplies::default().timeout);
        assert_eq!(history(&dispatcher, "u1"), vec![Turn::user("hello")]);
    }

    #[tokio::test]
    async fn blank_completion_is_not_recorded_as_assistant_turn() {
        let dispatcher = dispatcher(Arc::new(MockBackend::succeeding("  \n ")));

        let reply = dispatcher.handle(&InboundEvent::direct("u1", BOT, "hello")).await;

        assert_eq!(reply.kind(), ReplyKind::Formatted(ReplySource::EmptyFallback));
        assert_eq!(history(&dispatcher, "u1"), vec![Turn::user("hello")]);
    }

    #[tokio::test]
    async fn prompt_carries_system_prompt_and_history() {
        let backend = Arc::new(RecordingBackend::default());
        let config = DispatcherConfig {
            system_prompt: Some("You are Jarvis.".to_string()),
            ..DispatcherConfig::default()
        };
        let dispatcher = dispatcher_with(backend.clone(), config);

        dispatcher.handle(&InboundEvent::direct("u1", BOT, "first")).await;
        dispatcher.handle(&InboundEvent::direct("u1", BOT, "second")).await;

        let requests = backend.requests.lock().expect("requests lock");
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].messages(),
            &[
                Turn::system("You are Jarvis."),
                Turn::user("first"),
                Turn::assistant("reply 1"),
                Turn::user("second"),
            ]
        );
        assert_eq!(requests[1].model(), "test-model");
    }

    #[tokio::test]
    async fn users_have_separate_histories() {
        let dispatcher = dispatcher(Arc::new(RecordingBackend::default()));

        dispatcher.handle(&InboundEvent::direct("alice", BOT, "hi")).await;
        dispatcher.handle(&InboundEvent::direct("bob", BOT, "yo")).await;

        assert_eq!(history(&dispatcher, "alice")[0], Turn::user("hi"));
        assert_eq!(history(&dispatcher, "bob")[0], Turn::user("yo"));
        assert_eq!(history(&dispatcher, "alice").len(), 2);
    }

    #[tokio::test]
    async fn reset_command_clears_history() {
        let backend = Arc::new(MockBackend::succeeding("hi there"));
        let dispatcher = dispatcher(backend.clone());

        dispatcher.handle(&InboundEvent::direct("u1", BOT, "hello")).await;
        let reply = dispatcher.handle(&InboundEvent::mention("u1", BOT, "<@!42> /RESET")).await;

        assert_eq!(reply.kind(), ReplyKind::Reset);
        assert_eq!(reply.text(), ReplyTexts::default().reset_done);
        assert!(history(&dispatcher, "u1").is_empty());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn long_reply_is_truncated_and_recorded_truncated() {
        let config = DispatcherConfig {
            max_message_length: 10,
            ..DispatcherConfig::default()
        };
        let dispatcher = dispatcher_with(
            Arc::new(MockBackend::succeeding("abcdefghijklmnop")),
            config,
        );

        let reply = dispatcher.handle(&InboundEvent::direct("u1", BOT, "spell")).await;

        assert_eq!(reply.text(), "abcdefg...");
        assert_eq!(history(&dispatcher, "u1")[1], Turn::assistant("abcdefg..."));
    }

    #[tokio::test]
    async fn panic_in_backend_becomes_generic_fallback() {
        let dispatcher = dispatcher(Arc::new(PanickingBackend));

        let reply = dispatcher.handle(&InboundEvent::direct("u1", BOT, "hello")).await;

        assert_eq!(reply.kind(), ReplyKind::Fault);
        assert_eq!(reply.text(), FallbackReplies::default().failure);
        assert!(history(&dispatcher, "u1").is_empty());
    }

    #[tokio::test]
    async fn missing_user_id_becomes_generic_fallback() {
        let backend = Arc::new(MockBackend::succeeding("unused"));
        let dispatcher = dispatcher(backend.clone());

        let reply = dispatcher.handle(&InboundEvent::direct("", BOT, "hello")).await;

        assert_eq!(reply.kind(), ReplyKind::Fault);
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn invalid_pattern_fails_construction() {
        let config = DispatcherConfig {
            addressing: AddressingSyntax {
                pattern: "(".to_string(),
                ..AddressingSyntax::default()
            },
            ..DispatcherConfig::default()
        };
        let client = CompletionClient::new(
            Arc::new(MockBackend::succeeding("")),
            CompletionSettings::new("m"),
        );

        let result = Dispatcher::new(config, Arc::new(ConversationStore::new(5)), client);
        assert!(result.is_err());
    }

    #[test]
    fn zero_timeout_fails_construction() {
        let config = DispatcherConfig {
            response_timeout: Duration::ZERO,
            ..DispatcherConfig::default()
        };
        let client = CompletionClient::new(
            Arc::new(MockBackend::succeeding("")),
            CompletionSettings::new("m"),
        );

        let err = Dispatcher::new(config, Arc::new(ConversationStore::new(5)), client)
            .expect_err("should fail");
        assert!(err.to_string().contains("timeout"));
    }
}
