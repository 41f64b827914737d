//! Chat bot process for chatrelay.
//!
//! Wires configuration, the completion backend, the conversation store and
//! the dispatcher together, and provides the console channel.

pub mod config;
pub mod console;
pub mod error;

use crate::config::BotConfig;
use crate::error::StartupError;
use chatrelay_ai::{CompletionClient, OpenAiBackend};
use chatrelay_conversation::ConversationStore;
use chatrelay_dispatch::Dispatcher;
use rootcause::Report;
use std::sync::Arc;
use tracing::info;

/// Builds the dispatcher described by `config`.
///
/// # Errors
///
/// Returns an error if the backend or dispatcher rejects the configuration.
pub fn build_dispatcher(config: &BotConfig) -> Result<Dispatcher, Report<StartupError>> {
    let backend = OpenAiBackend::new(&config.provider.base_url, config.provider.api_key.clone())
        .map_err(|e| StartupError::Backend {
            reason: e.to_string(),
        })?;
    info!(
        endpoint = backend.endpoint(),
        model = %config.provider.model,
        "completion backend ready"
    );

    let client = CompletionClient::new(Arc::new(backend), config.completion_settings());
    let store = Arc::new(ConversationStore::new(config.chat.max_history));

    let dispatcher = Dispatcher::new(config.dispatcher_config(), store, client).map_err(|e| {
        StartupError::Dispatcher {
            reason: e.to_string(),
        }
    })?;
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = BotConfig::default();
        let dispatcher = build_dispatcher(&config).expect("default config builds");
        assert_eq!(dispatcher.store().max_history(), 5);
    }

    #[test]
    fn bad_addressing_pattern_fails_startup() {
        let mut config = BotConfig::default();
        config.bot.addressing_pattern = "[unclosed".to_string();

        let err = build_dispatcher(&config).expect_err("invalid pattern");
        assert!(err.to_string().contains("failed to create dispatcher"));
    }
}
