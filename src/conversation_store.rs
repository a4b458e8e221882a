//! Conversation Store (SPEC_FULL.md §5): ownership-scoped CRUD over
//! in-memory conversation records, each independently lockable so
//! concurrent turns on different conversations never contend.
//!
//! Generalizes `src/cloudllm/llm_session.rs`'s pattern of a conversation's
//! history living as an owned `Vec<Message>` inside one struct, widened
//! from a single in-process session to a `DashMap` of independently
//! `tokio::sync::Mutex`-guarded records — and reuses
//! `src/cloudllm/tools/memory.rs`'s background-sweep idiom for garbage
//! collection instead of evicting inline on every access.

use crate::error::AgentError;
use crate::models::{Conversation, ConversationId, ProviderRef, UserId};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Process-wide, in-memory table of conversations.
///
/// Not persisted across restarts — SPEC_FULL.md treats conversations as
/// ephemeral session state, not a system of record (the portfolio backend
/// behind [`crate::raw_data_client::RawDataClient`] owns durable data).
pub struct ConversationStore {
    conversations: DashMap<ConversationId, Arc<Mutex<Conversation>>>,
    gc_after_hours: i64,
}

impl ConversationStore {
    pub fn new(gc_after_hours: u64) -> Arc<Self> {
        let store = Arc::new(Self {
            conversations: DashMap::new(),
            gc_after_hours: gc_after_hours as i64,
        });
        store.clone().spawn_gc_loop();
        store
    }

    pub fn create(&self, owner_user_id: UserId, provider_ref: ProviderRef) -> Arc<Mutex<Conversation>> {
        let conversation = Conversation::new(owner_user_id, provider_ref);
        let id = conversation.id;
        let handle = Arc::new(Mutex::new(conversation));
        self.conversations.insert(id, handle.clone());
        handle
    }

    /// Fetches a conversation, enforcing ownership. A conversation that
    /// exists but belongs to a different user reports the exact same
    /// not-found error as a conversation that doesn't exist at all — never
    /// `Auth` — so a caller can't use the distinction to probe for the
    /// existence of other users' conversation ids (spec.md §4.5).
    pub async fn get_owned(&self, id: ConversationId, user_id: &str) -> Result<Arc<Mutex<Conversation>>, AgentError> {
        let not_found = || AgentError::Input(format!("no such conversation: {}", id));

        let handle = self.conversations.get(&id).map(|entry| entry.value().clone()).ok_or_else(not_found)?;

        {
            let conv = handle.lock().await;
            if conv.owner_user_id != user_id {
                return Err(not_found());
            }
        }

        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    fn spawn_gc_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                let cutoff = Utc::now() - chrono::Duration::hours(self.gc_after_hours);
                let mut stale = Vec::new();
                for entry in self.conversations.iter() {
                    if entry.value().lock().await.last_active_at < cutoff {
                        stale.push(*entry.key());
                    }
                }
                for id in stale {
                    self.conversations.remove(&id);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_ref() -> ProviderRef {
        ProviderRef { provider_name: "openai".to_string(), session_handle: "sess-1".to_string() }
    }

    #[tokio::test]
    async fn create_then_get_owned_succeeds() {
        let store = ConversationStore::new(24);
        let handle = store.create("user-1".to_string(), provider_ref());
        let id = handle.lock().await.id;
        let fetched = store.get_owned(id, "user-1").await;
        assert!(fetched.is_ok());
    }

    #[tokio::test]
    async fn get_owned_by_wrong_user_is_not_found_not_auth() {
        let store = ConversationStore::new(24);
        let handle = store.create("user-1".to_string(), provider_ref());
        let id = handle.lock().await.id;
        let result = store.get_owned(id, "user-2").await;
        assert!(matches!(result, Err(AgentError::Input(_))));
    }

    #[tokio::test]
    async fn wrong_owner_and_unknown_id_report_the_same_error_variant() {
        let store = ConversationStore::new(24);
        let handle = store.create("user-1".to_string(), provider_ref());
        let id = handle.lock().await.id;
        let wrong_owner = store.get_owned(id, "user-2").await.unwrap_err();
        let unknown = store.get_owned(uuid::Uuid::new_v4(), "user-2").await.unwrap_err();
        assert!(matches!(wrong_owner, AgentError::Input(_)));
        assert!(matches!(unknown, AgentError::Input(_)));
    }

    #[tokio::test]
    async fn get_owned_unknown_id_is_input_error() {
        let store = ConversationStore::new(24);
        let result = store.get_owned(uuid::Uuid::new_v4(), "user-1").await;
        assert!(matches!(result, Err(AgentError::Input(_))));
    }
}
