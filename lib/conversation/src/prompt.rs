//! Prompt assembly.
//!
//! Turns a stored history and a new user message into the ordered turn
//! sequence submitted to the completion provider.

use crate::message::Turn;

/// Builds provider prompts from history and an optional system instruction.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    system_prompt: Option<String>,
}

impl PromptBuilder {
    /// Creates a builder. Empty or missing instructions produce no system turn.
    #[must_use]
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            system_prompt: system_prompt.filter(|p| !p.trim().is_empty()),
        }
    }

    /// Returns the effective system instruction.
    #[must_use]
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Composes `[system?] + history + user(new_user_message)`.
    ///
    /// `history` is consumed as-is; the builder neither reorders nor filters it.
    #[must_use]
    pub fn build(&self, history: Vec<Turn>, new_user_message: &str) -> Vec<Turn> {
        let mut turns = Vec::with_capacity(history.len() + 2);

        if let Some(system) = &self.system_prompt {
            turns.push(Turn::system(system.clone()));
        }

        turns.extend(history);
        turns.push(Turn::user(new_user_message));
        turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn build_without_system_prompt() {
        let builder = PromptBuilder::new(None);
        let turns = builder.build(vec![Turn::user("hi"), Turn::assistant("hello")], "how are you?");

        assert_eq!(
            turns,
            vec![
                Turn::user("hi"),
                Turn::assistant("hello"),
                Turn::user("how are you?"),
            ]
        );
    }

    #[test]
    fn build_prefixes_system_prompt() {
        let builder = PromptBuilder::new(Some("You are terse.".to_string()));
        let turns = builder.build(Vec::new(), "ping");

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], Turn::system("You are terse."));
        assert_eq!(turns[1].role(), Role::User);
        assert_eq!(turns[1].content(), "ping");
    }

    #[test]
    fn blank_system_prompt_is_ignored() {
        let builder = PromptBuilder::new(Some("   ".to_string()));
        assert!(builder.system_prompt().is_none());
        assert_eq!(builder.build(Vec::new(), "ping"), vec![Turn::user("ping")]);
    }

    #[test]
    fn build_does_not_mutate_source_history() {
        let builder = PromptBuilder::new(Some("sys".to_string()));
        let history = vec![Turn::user("earlier")];

        let turns = builder.build(history.clone(), "now");

        assert_eq!(history, vec![Turn::user("earlier")]);
        assert_eq!(turns.len(), 3);
    }
}
