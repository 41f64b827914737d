//! Addressing-token removal.
//!
//! Group messages carry platform markup naming the bot (e.g. `<@!1234>`).
//! The exact token for the bot's own identity is removed first, then every
//! match of a general pattern, because the identity the transport reports
//! does not always match the one embedded in the text.

use crate::error::DispatchError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder replaced with the bot's identity in [`AddressingSyntax::template`].
pub const ID_PLACEHOLDER: &str = "{id}";

/// Platform syntax for addressing a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressingSyntax {
    /// Token naming a specific participant, with `{id}` for the identity.
    pub template: String,
    /// Regular expression matching any addressing token. Empty disables it.
    pub pattern: String,
}

impl Default for AddressingSyntax {
    fn default() -> Self {
        Self {
            template: "<@!{id}>".to_string(),
            pattern: r"<@!?\d+>".to_string(),
        }
    }
}

/// Compiled form of an [`AddressingSyntax`].
#[derive(Debug, Clone)]
pub struct AddressStripper {
    template: String,
    any: Option<Regex>,
}

impl AddressStripper {
    /// Compiles the syntax.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regular expression.
    pub fn new(syntax: &AddressingSyntax) -> Result<Self, DispatchError> {
        let any = if syntax.pattern.trim().is_empty() {
            None
        } else {
            let regex = Regex::new(&syntax.pattern).map_err(|e| {
                DispatchError::InvalidAddressingPattern {
                    pattern: syntax.pattern.clone(),
                    reason: e.to_string(),
                }
            })?;
            Some(regex)
        };

        Ok(Self {
            template: syntax.template.clone(),
            any,
        })
    }

    /// The exact token addressing `self_token`, if both are non-empty.
    #[must_use]
    pub fn exact_token(&self, self_token: &str) -> Option<String> {
        if self.template.is_empty() || self_token.trim().is_empty() {
            return None;
        }
        Some(self.template.replace(ID_PLACEHOLDER, self_token.trim()))
    }

    /// Removes addressing tokens from `text` and trims the remainder.
    #[must_use]
    pub fn strip(&self, text: &str, self_token: &str) -> String {
        let mut cleaned = match self.exact_token(self_token) {
            Some(token) => text.replace(&token, ""),
            None => text.to_string(),
        };

        if let Some(any) = &self.any {
            cleaned = any.replace_all(&cleaned, "").into_owned();
        }

        cleaned.trim().to_string()
    }
}
