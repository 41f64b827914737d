//! Bounded in-memory conversation history.
//!
//! Each user owns an independent history behind its own mutex. The outer map
//! is only locked long enough to look up or insert a user's slot, so work on
//! one user's history never waits on another user's.

use crate::message::{Role, Turn};
use chatrelay_core::UserId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, trace};

type History = Arc<Mutex<VecDeque<Turn>>>;

/// Per-user conversation history, bounded to `2 × max_history` turns.
///
/// Histories live for the lifetime of the process and are only dropped by
/// [`ConversationStore::clear_conversation`].
#[derive(Debug)]
pub struct ConversationStore {
    max_history: usize,
    conversations: RwLock<HashMap<UserId, History>>,
}

impl ConversationStore {
    /// Creates a store retaining up to `max_history` user/assistant pairs per
    /// user.
    #[must_use]
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the configured number of retained pairs.
    #[must_use]
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Maximum number of turns kept for a single user.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_history.saturating_mul(2)
    }

    /// Appends a turn to the user's history, evicting the oldest turns once
    /// the history exceeds [`capacity`](Self::capacity).
    pub fn add_message(&self, user_id: &UserId, role: Role, content: impl Into<String>) {
        self.append(user_id, [Turn::new(role, content)]);
    }

    /// Appends the user's turn and, when present, the assistant's reply as a
    /// single step so concurrent dispatches for the same user cannot land
    /// between them.
    pub fn record_exchange(
        &self,
        user_id: &UserId,
        user_text: impl Into<String>,
        assistant_text: Option<String>,
    ) {
        let user_turn = Turn::user(user_text);
        match assistant_text {
            Some(reply) => self.append(user_id, [user_turn, Turn::assistant(reply)]),
            None => self.append(user_id, [user_turn]),
        }
    }

    /// Returns a copy of the user's history, preceded by a system turn when
    /// `system_prompt` is non-empty.
    ///
    /// Unknown users yield an empty history.
    #[must_use]
    pub fn get_messages(&self, user_id: &UserId, system_prompt: Option<&str>) -> Vec<Turn> {
        let mut messages = Vec::new();

        if let Some(prompt) = system_prompt.filter(|p| !p.is_empty()) {
            messages.push(Turn::system(prompt));
        }

        if let Some(history) = self.slot(user_id) {
            let history = history.lock().unwrap_or_else(PoisonError::into_inner);
            messages.extend(history.iter().cloned());
        }

        messages
    }

    /// Drops the user's history. Clearing an unknown user is a no-op.
    pub fn clear_conversation(&self, user_id: &UserId) {
        let removed = self
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);

        if removed.is_some() {
            debug!(%user_id, "conversation cleared");
        }
    }

    /// Number of turns currently stored for the user.
    #[must_use]
    pub fn history_len(&self, user_id: &UserId) -> usize {
        self.slot(user_id).map_or(0, |history| {
            history.lock().unwrap_or_else(PoisonError::into_inner).len()
        })
    }

    /// Number of users with a live history.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn slot(&self, user_id: &UserId) -> Option<History> {
        self.conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    fn slot_or_insert(&self, user_id: &UserId) -> History {
        if let Some(history) = self.slot(user_id) {
            return history;
        }

        self.conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id.clone())
            .or_default()
            .clone()
    }

    fn append<const N: usize>(&self, user_id: &UserId, turns: [Turn; N]) {
        let capacity = self.capacity();
        let history = self.slot_or_insert(user_id);
        let mut history = history.lock().unwrap_or_else(PoisonError::into_inner);

        history.extend(turns);

        let mut evicted = 0;
        while history.len() > capacity {
            history.pop_front();
            evicted += 1;
        }

        trace!(%user_id, len = history.len(), evicted, "history updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn user(id: &str) -> UserId {
        UserId::from(id)
    }

    #[test]
    fn unknown_user_has_empty_history() {
        let store = ConversationStore::new(5);
        assert!(store.get_messages(&user("nobody"), None).is_empty());
        assert_eq!(store.history_len(&user("nobody")), 0);
    }

    #[test]
    fn history_is_bounded_to_most_recent_turns() {
        let store = ConversationStore::new(2);
        let u = user("u1");

        for i in 0..7 {
            store.add_message(&u, Role::User, format!("q{i}"));
            store.add_message(&u, Role::Assistant, format!("a{i}"));

            let expected_len = (2 * (i + 1)).min(4);
            assert_eq!(store.history_len(&u), expected_len);
        }

        let contents: Vec<_> = store
            .get_messages(&u, None)
            .iter()
            .map(|t| t.content().to_string())
            .collect();
        assert_eq!(contents, vec!["q5", "a5", "q6", "a6"]);
    }

    #[test]
    fn odd_insertions_keep_suffix() {
        let store = ConversationStore::new(1);
        let u = user("u1");

        store.add_message(&u, Role::User, "one");
        store.add_message(&u, Role::Assistant, "two");
        store.add_message(&u, Role::User, "three");

        let history = store.get_messages(&u, None);
        assert_eq!(history, vec![Turn::assistant("two"), Turn::user("three")]);
    }

    #[test]
    fn system_prompt_is_prepended_not_stored() {
        let store = ConversationStore::new(5);
        let u = user("u1");
        store.add_message(&u, Role::User, "hello");

        let messages = store.get_messages(&u, Some("be brief"));
        assert_eq!(messages, vec![Turn::system("be brief"), Turn::user("hello")]);
        assert_eq!(store.history_len(&u), 1);
    }

    #[test]
    fn empty_system_prompt_is_skipped() {
        let store = ConversationStore::new(5);
        assert!(store.get_messages(&user("u1"), Some("")).is_empty());
    }

    #[test]
    fn returned_history_is_a_copy() {
        let store = ConversationStore::new(5);
        let u = user("u1");
        store.add_message(&u, Role::User, "hello");

        let mut copy = store.get_messages(&u, None);
        copy.push(Turn::assistant("injected"));
        copy.clear();

        assert_eq!(store.get_messages(&u, None), vec![Turn::user("hello")]);
    }

    #[test]
    fn clear_is_idempotent() {
        let store = ConversationStore::new(5);
        let u = user("u1");
        store.add_message(&u, Role::User, "hello");

        store.clear_conversation(&u);
        store.clear_conversation(&u);

        assert!(store.get_messages(&u, None).is_empty());
        assert_eq!(
            store.get_messages(&u, Some("sys")),
            vec![Turn::system("sys")]
        );
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn clearing_one_user_leaves_others() {
        let store = ConversationStore::new(5);
        store.add_message(&user("a"), Role::User, "from a");
        store.add_message(&user("b"), Role::User, "from b");

        store.clear_conversation(&user("a"));

        assert_eq!(store.history_len(&user("a")), 0);
        assert_eq!(store.history_len(&user("b")), 1);
    }

    #[test]
    fn record_exchange_without_reply_stores_user_turn_only() {
        let store = ConversationStore::new(5);
        let u = user("u1");

        store.record_exchange(&u, "hello", None);
        store.record_exchange(&u, "again", Some("hi".to_string()));

        assert_eq!(
            store.get_messages(&u, None),
            vec![Turn::user("hello"), Turn::user("again"), Turn::assistant("hi")]
        );
    }

    #[test]
    fn zero_history_retains_nothing() {
        let store = ConversationStore::new(0);
        let u = user("u1");
        store.record_exchange(&u, "hello", Some("hi".to_string()));
        assert_eq!(store.history_len(&u), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_users_do_not_interfere() {
        let store = Arc::new(ConversationStore::new(50));
        let mut handles = Vec::new();

        for n in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let u = UserId::new(format!("user-{n}"));
                for i in 0..25 {
                    store.record_exchange(&u, format!("q{i}"), Some(format!("a{i}")));
                }
            }));
        }

        for handle in handles {
            handle.await.expect("task panicked");
        }

        assert_eq!(store.user_count(), 8);
        for n in 0..8 {
            let history = store.get_messages(&UserId::new(format!("user-{n}")), None);
            assert_eq!(history.len(), 50);
            for pair in history.chunks(2) {
                assert_eq!(pair[0].role(), Role::User);
                assert_eq!(pair[1].role(), Role::Assistant);
                assert_eq!(&pair[0].content()[1..], &pair[1].content()[1..]);
            }
        }
    }
}
