//! Token-budgeted thread history retrieval
//!
//! Produces the bounded message window handed to the agent runtime: the most
//! recent messages of a thread whose cumulative token cost fits the caller's
//! context budget, returned in chronological order.
//!
//! Memory context is best-effort. Any storage or counting failure degrades
//! to an empty window; it never fails the parent request. An empty result
//! therefore means "disabled", "nothing stored", or "failed"; the paths are
//! distinguished in logs only.

use super::counter::TokenCounter;
use crate::config::MemoryConfig;
use crate::error::HelpdeskResult;
use crate::thread::{Message, MessageStore, SortOrder};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Loads a thread's messages and truncates them to a token budget
#[derive(Clone)]
pub struct MessageHistoryProvider {
    store: Arc<dyn MessageStore>,
    counter: TokenCounter,
    config: MemoryConfig,
}

impl MessageHistoryProvider {
    /// Create a provider with the default counter and config
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self::with_config(store, TokenCounter::default(), MemoryConfig::default())
    }

    /// Create a provider with a custom counter and config
    pub fn with_config(
        store: Arc<dyn MessageStore>,
        counter: TokenCounter,
        config: MemoryConfig,
    ) -> Self {
        Self {
            store,
            counter,
            config,
        }
    }

    /// Token counter used for budgeting
    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Retrieve a thread's messages bounded by `max_context_size` tokens.
    ///
    /// Returns chronologically ordered messages. When truncation occurs the
    /// result is always a suffix of the full history: the most recent
    /// messages are kept, older ones are dropped first.
    ///
    /// `use_memory_context == false` or a zero budget disables retrieval
    /// entirely (policy toggle, not an error): no storage access happens.
    pub async fn get_thread_messages(
        &self,
        thread_id: Uuid,
        max_context_size: usize,
        use_memory_context: bool,
    ) -> Vec<Message> {
        if !use_memory_context || max_context_size == 0 {
            debug!(
                %thread_id,
                use_memory_context, max_context_size, "memory context disabled"
            );
            return Vec::new();
        }

        match self.load_bounded(thread_id, max_context_size).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(%thread_id, "history retrieval failed, continuing without context: {}", e);
                Vec::new()
            }
        }
    }

    async fn load_bounded(
        &self,
        thread_id: Uuid,
        max_context_size: usize,
    ) -> HelpdeskResult<Vec<Message>> {
        let mut newest_first = self
            .store
            .load_messages(thread_id, SortOrder::Descending, self.config.load_limit)
            .await?;

        // Small threads skip budget filtering entirely; the window is the
        // whole conversation.
        if newest_first.len() <= self.config.small_thread_threshold {
            newest_first.reverse();
            return Ok(newest_first);
        }

        let mut kept = Vec::new();
        let mut total = 0usize;
        for message in newest_first {
            let cost = self.counter.count_message_tokens(&message);
            if total + cost > max_context_size {
                break;
            }
            total += cost;
            kept.push(message);
        }

        debug!(
            %thread_id,
            kept = kept.len(),
            tokens = total,
            budget = max_context_size,
            "bounded message window computed"
        );

        kept.reverse();
        Ok(kept)
    }
}
