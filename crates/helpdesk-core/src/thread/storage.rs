//! Read-only storage interface for threads and messages
//!
//! The persistence layer lives outside this core. Any store that can return
//! ordered message records satisfies [`MessageStore`]; the core never writes
//! through this interface.

use super::message::{Message, Thread};
use crate::error::{HelpdeskError, HelpdeskResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Ordering applied to loaded messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first
    Ascending,
    /// Newest first
    Descending,
}

/// Read-only access to persisted threads and messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Load up to `limit` messages for a thread, ordered by `created_at`
    async fn load_messages(
        &self,
        thread_id: Uuid,
        order: SortOrder,
        limit: usize,
    ) -> HelpdeskResult<Vec<Message>>;

    /// Load a thread by id
    async fn load_thread(&self, thread_id: Uuid) -> HelpdeskResult<Option<Thread>>;
}

/// In-memory message store
///
/// Used in tests and as the default store for ephemeral deployments. Tracks
/// how many load calls were made so tests can assert the disabled-memory
/// path never touches storage.
#[derive(Default)]
pub struct InMemoryMessageStore {
    threads: RwLock<HashMap<Uuid, Thread>>,
    messages: RwLock<HashMap<Uuid, Vec<Message>>>,
    load_calls: AtomicU64,
}

impl InMemoryMessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a thread record
    pub fn insert_thread(&self, thread: Thread) {
        self.threads.write().insert(thread.id, thread);
    }

    /// Append a message to its thread
    pub fn push_message(&self, message: Message) {
        let mut messages = self.messages.write();
        let entries = messages.entry(message.thread_id).or_default();
        entries.push(message);
        entries.sort_by_key(|m| m.created_at);
    }

    /// Number of `load_messages` calls made against this store
    pub fn load_call_count(&self) -> u64 {
        self.load_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn load_messages(
        &self,
        thread_id: Uuid,
        order: SortOrder,
        limit: usize,
    ) -> HelpdeskResult<Vec<Message>> {
        self.load_calls.fetch_add(1, Ordering::Relaxed);

        let messages = self.messages.read();
        let mut result: Vec<Message> = messages
            .get(&thread_id)
            .ok_or_else(|| HelpdeskError::storage(format!("unknown thread {}", thread_id)))?
            .clone();

        if order == SortOrder::Descending {
            result.reverse();
        }
        result.truncate(limit);
        Ok(result)
    }

    async fn load_thread(&self, thread_id: Uuid) -> HelpdeskResult<Option<Thread>> {
        Ok(self.threads.read().get(&thread_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::message::MessageRole;
    use chrono::{Duration, Utc};

    fn seed(store: &InMemoryMessageStore, thread_id: Uuid, count: usize) {
        let base = Utc::now() - Duration::hours(1);
        for i in 0..count {
            store.push_message(
                Message::new(thread_id, MessageRole::User, format!("message {}", i))
                    .with_created_at(base + Duration::seconds(i as i64)),
            );
        }
    }

    #[tokio::test]
    async fn test_load_descending_newest_first() {
        let store = InMemoryMessageStore::new();
        let thread_id = Uuid::new_v4();
        seed(&store, thread_id, 5);

        let messages = store
            .load_messages(thread_id, SortOrder::Descending, 3)
            .await
            .unwrap();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "message 4");
        assert!(messages[0].created_at > messages[1].created_at);
    }

    #[tokio::test]
    async fn test_load_unknown_thread_is_an_error() {
        let store = InMemoryMessageStore::new();
        let result = store
            .load_messages(Uuid::new_v4(), SortOrder::Ascending, 10)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_call_counter() {
        let store = InMemoryMessageStore::new();
        let thread_id = Uuid::new_v4();
        seed(&store, thread_id, 1);

        assert_eq!(store.load_call_count(), 0);
        let _ = store
            .load_messages(thread_id, SortOrder::Ascending, 10)
            .await;
        assert_eq!(store.load_call_count(), 1);
    }
}
