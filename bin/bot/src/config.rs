//! Centralized bot configuration.
//!
//! Loaded via the `config` crate from an optional TOML file layered under
//! environment variables. The file defaults to `chatrelay.toml` in the working
//! directory; `CHATRELAY_CONFIG` points elsewhere. Environment variables use
//! the `CHATRELAY_` prefix and `__` between sections, for example
//! `CHATRELAY_CHAT__MAX_HISTORY=10`.

use crate::error::ConfigError;
use chatrelay_ai::{CompletionSettings, FallbackReplies, TRUNCATION_MARKER};
use chatrelay_core::UserId;
use chatrelay_dispatch::{AddressingSyntax, DispatcherConfig, ReplyTexts};
use rootcause::Report;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "CHATRELAY_CONFIG";

/// Configuration file used when [`CONFIG_PATH_VAR`] is unset.
pub const DEFAULT_CONFIG_FILE: &str = "chatrelay.toml";

const ENV_PREFIX: &str = "CHATRELAY";

/// Bot configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Completion provider access.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Conversation and reply limits.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Bot identity and mention syntax.
    #[serde(default)]
    pub bot: IdentityConfig,

    /// Overrides for canned reply texts.
    #[serde(default)]
    pub replies: RepliesConfig,

    /// Console channel settings.
    #[serde(default)]
    pub console: ConsoleConfig,

    /// Default log filter, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// OpenAI-compatible provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token, omitted from requests when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Conversation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Exchanges kept per user; the store holds twice as many turns.
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Deadline for each provider call, in seconds.
    #[serde(default = "default_response_timeout_seconds")]
    pub response_timeout_seconds: u64,

    /// Maximum reply length in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// System instruction prefixed to every prompt. An empty string
    /// disables it.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: Option<String>,
}

/// How the bot is addressed on the chat platform.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// The bot's own platform identity.
    #[serde(default)]
    pub self_id: String,

    /// Token addressing a given identity; `{id}` is replaced.
    #[serde(default = "default_addressing_template")]
    pub addressing_template: String,

    /// Regular expression matching any addressing token.
    #[serde(default = "default_addressing_pattern")]
    pub addressing_pattern: String,
}

/// Reply text overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepliesConfig {
    /// Help and reset notices.
    #[serde(default)]
    pub notices: ReplyTexts,

    /// Fallbacks for failed completions.
    #[serde(default)]
    pub fallbacks: FallbackReplies,
}

/// Console channel settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    /// User identity for lines read from stdin.
    #[serde(default = "default_console_user_id")]
    pub user_id: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_max_history() -> usize {
    5
}

fn default_response_timeout_seconds() -> u64 {
    30
}

fn default_max_message_length() -> usize {
    2000
}

/// Persona used when no system prompt is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly and helpful assistant in a group chat. \
     Answer questions clearly and concisely, and say so when you are unsure.";

fn default_system_prompt() -> Option<String> {
    Some(DEFAULT_SYSTEM_PROMPT.to_string())
}

fn default_addressing_template() -> String {
    AddressingSyntax::default().template
}

fn default_addressing_pattern() -> String {
    AddressingSyntax::default().pattern
}

fn default_console_user_id() -> String {
    "console".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            chat: ChatConfig::default(),
            bot: IdentityConfig::default(),
            replies: RepliesConfig::default(),
            console: ConsoleConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            response_timeout_seconds: default_response_timeout_seconds(),
            max_message_length: default_max_message_length(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            self_id: String::new(),
            addressing_template: default_addressing_template(),
            addressing_pattern: default_addressing_pattern(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            user_id: default_console_user_id(),
        }
    }
}

impl BotConfig {
    /// Loads configuration from the configured file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value is invalid.
    pub fn load() -> Result<Self, Report<ConfigError>> {
        let path = std::env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::from_sources(Some(&path), environment())
    }

    /// Loads configuration from an optional file and an environment source.
    ///
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value is invalid.
    pub fn from_sources(
        file: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, Report<ConfigError>> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        let config: Self = builder
            .add_source(env)
            .build()
            .and_then(|built| built.try_deserialize::<Self>())
            .map_err(|e| ConfigError::Load {
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<(), Report<ConfigError>> {
        if self.chat.max_history == 0 {
            return Err(invalid("chat.max_history", "must be at least 1"));
        }
        if self.chat.response_timeout_seconds == 0 {
            return Err(invalid(
                "chat.response_timeout_seconds",
                "must be greater than zero",
            ));
        }
        if self.chat.max_message_length <= TRUNCATION_MARKER.len() {
            return Err(invalid(
                "chat.max_message_length",
                format!(
                    "must be greater than {} to leave room for the truncation marker",
                    TRUNCATION_MARKER.len()
                ),
            ));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(invalid("provider.temperature", "must be between 0 and 2"));
        }
        if self.provider.model.trim().is_empty() {
            return Err(invalid("provider.model", "must not be empty"));
        }
        if self.provider.base_url.trim().is_empty() {
            return Err(invalid("provider.base_url", "must not be empty"));
        }
        if self.console.user_id.trim().is_empty() {
            return Err(invalid("console.user_id", "must not be empty"));
        }
        Ok(())
    }

    /// Provider parameters for each completion request.
    #[must_use]
    pub fn completion_settings(&self) -> CompletionSettings {
        CompletionSettings::new(self.provider.model.clone())
            .with_temperature(self.provider.temperature)
            .with_max_tokens(self.provider.max_tokens)
    }

    /// Dispatcher settings derived from this configuration.
    #[must_use]
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            system_prompt: self.chat.system_prompt.clone(),
            response_timeout: Duration::from_secs(self.chat.response_timeout_seconds),
            max_message_length: self.chat.max_message_length,
            addressing: AddressingSyntax {
                template: self.bot.addressing_template.clone(),
                pattern: self.bot.addressing_pattern.clone(),
            },
            replies: self.replies.notices.clone(),
            fallbacks: self.replies.fallbacks.clone(),
        }
    }

    /// Identity used for console input.
    #[must_use]
    pub fn console_user(&self) -> UserId {
        UserId::new(self.console.user_id.trim())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn invalid(field: &'static str, reason: impl Into<String>) -> Report<ConfigError> {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
    .into()
}
