//! In-memory Session Store: current main session per chat, a bounded
//! per-chat FIFO queue, and a resume-token cache.
//!
//! Get-or-create / update-in-place access over `DashMap`s of in-memory
//! structs — this store is transient, never itself persisted (the durable
//! mirror is `bridge_store::resume`).

use std::collections::VecDeque;

use bridge_core::ChatId;
use dashmap::DashMap;
use tracing::instrument;

use crate::error::{Result, SessionError};
use crate::types::{QueuedMessage, Session};

#[derive(Default)]
pub struct SessionStore {
    main: DashMap<ChatId, Session>,
    queues: DashMap<ChatId, VecDeque<QueuedMessage>>,
    resume_cache: DashMap<(ChatId, String), String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_main(&self, chat_id: &ChatId) -> Option<Session> {
        self.main.get(chat_id).map(|e| e.value().clone())
    }

    pub fn set_main(&self, session: Session) {
        self.main.insert(session.chat_id.clone(), session);
    }

    /// Mutate the main session in place, e.g. to record `pendingTools` or
    /// `lastText` as events arrive. No-op if there is none.
    pub fn with_main_mut<R>(&self, chat_id: &ChatId, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.main.get_mut(chat_id).map(|mut e| f(&mut e))
    }

    pub fn clear_main(&self, chat_id: &ChatId) -> Option<Session> {
        self.main.remove(chat_id).map(|(_, s)| s)
    }

    /// A chat is busy when it has a main session that has not reached a
    /// terminal state.
    pub fn is_busy(&self, chat_id: &ChatId) -> bool {
        self.main
            .get(chat_id)
            .map(|e| !matches!(e.state, crate::types::SessionState::Completed))
            .unwrap_or(false)
    }

    /// Append to the per-chat queue, rejecting when it would exceed `bound`
    ///.
    #[instrument(skip(self, msg), fields(%chat_id, bound))]
    pub fn enqueue(&self, chat_id: &ChatId, msg: QueuedMessage, bound: usize) -> Result<usize> {
        let mut queue = self.queues.entry(chat_id.clone()).or_default();
        if queue.len() >= bound {
            return Err(SessionError::QueueFull { bound });
        }
        queue.push_back(msg);
        Ok(queue.len())
    }

    /// Pop the oldest queued message for `chat_id`, if any.
    pub fn dequeue(&self, chat_id: &ChatId) -> Option<QueuedMessage> {
        self.queues.get_mut(chat_id).and_then(|mut q| q.pop_front())
    }

    pub fn queue_len(&self, chat_id: &ChatId) -> usize {
        self.queues.get(chat_id).map(|q| q.len()).unwrap_or(0)
    }

    pub fn cache_resume_token(&self, chat_id: &ChatId, cli_name: &str, session_id: String) {
        self.resume_cache.insert((chat_id.clone(), cli_name.to_string()), session_id);
    }

    pub fn cached_resume_token(&self, chat_id: &ChatId, cli_name: &str) -> Option<String> {
        self.resume_cache.get(&(chat_id.clone(), cli_name.to_string())).map(|e| e.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueueContext;

    #[test]
    fn enqueue_rejects_past_bound() {
        let store = SessionStore::new();
        let chat = ChatId::new("1");
        for _ in 0..5 {
            store.enqueue(&chat, QueuedMessage::new("hi", vec![], QueueContext::default()), 5).unwrap();
        }
        let err = store.enqueue(&chat, QueuedMessage::new("overflow", vec![], QueueContext::default()), 5).unwrap_err();
        assert!(matches!(err, SessionError::QueueFull { bound: 5 }));
    }

    #[test]
    fn dequeue_is_fifo() {
        let store = SessionStore::new();
        let chat = ChatId::new("1");
        store.enqueue(&chat, QueuedMessage::new("first", vec![], QueueContext::default()), 5).unwrap();
        store.enqueue(&chat, QueuedMessage::new("second", vec![], QueueContext::default()), 5).unwrap();
        assert_eq!(store.dequeue(&chat).unwrap().text, "first");
        assert_eq!(store.dequeue(&chat).unwrap().text, "second");
        assert!(store.dequeue(&chat).is_none());
    }

    #[test]
    fn is_busy_false_until_main_session_set() {
        let store = SessionStore::new();
        let chat = ChatId::new("1");
        assert!(!store.is_busy(&chat));
        store.set_main(Session::new(chat.clone(), "claude", false));
        assert!(store.is_busy(&chat));
    }

    #[test]
    fn resume_token_cache_is_keyed_by_chat_and_cli() {
        let store = SessionStore::new();
        let chat = ChatId::new("1");
        store.cache_resume_token(&chat, "claude", "sess-a".to_string());
        store.cache_resume_token(&chat, "codex", "sess-b".to_string());
        assert_eq!(store.cached_resume_token(&chat, "claude").as_deref(), Some("sess-a"));
        assert_eq!(store.cached_resume_token(&chat, "codex").as_deref(), Some("sess-b"));
    }
}
