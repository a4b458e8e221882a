//! Per-conversation, per-tool TTL cache (SPEC_FULL.md §3.7).
//!
//! Generalizes this codebase's `tools/memory.rs` eviction idiom: entries
//! are stamped with a `DateTime<Utc>` rather than an `Instant`, because the
//! cache key must incorporate the caller's `as_of_date` and survive being
//! reasoned about across a process restart's worth of logs. Eviction runs
//! on a background sweep rather than on every read, same as `Memory::new`.

use crate::models::{CacheEntry, ConversationId, ResponseEnvelope};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Cache key: one entry per (conversation, tool name, canonicalized args).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub conversation_id: ConversationId,
    pub tool_name: String,
    pub args_fingerprint: String,
}

impl CacheKey {
    pub fn new(conversation_id: ConversationId, tool_name: &str, args: &serde_json::Value) -> Self {
        Self {
            conversation_id,
            tool_name: tool_name.to_string(),
            args_fingerprint: canonicalize(args),
        }
    }
}

/// Deterministic string fingerprint of a JSON value, independent of key
/// insertion order, so equivalent argument sets share a cache key.
fn canonicalize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = String::from("{");
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(key);
                out.push(':');
                out.push_str(&canonicalize(&map[*key]));
            }
            out.push('}');
            out
        }
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

/// Process-wide TTL cache shared by every tool handler.
///
/// Cleared implicitly when a conversation is garbage-collected, since no
/// entry outlives its own TTL (default 600s, `AgentServerConfig::cache_ttl_secs`)
/// regardless of whether the owning conversation still exists.
pub struct ToolResultCache {
    entries: DashMap<CacheKey, CacheEntry>,
    default_ttl_secs: u64,
}

impl ToolResultCache {
    pub fn new(default_ttl_secs: u64) -> Arc<Self> {
        let cache = Arc::new(Self {
            entries: DashMap::new(),
            default_ttl_secs,
        });
        cache.clone().spawn_eviction_loop();
        cache
    }

    /// Returns a cached envelope if present and not yet expired. An
    /// expired entry is removed on read as well as by the background
    /// sweep, so a get-then-expired race never serves stale data.
    pub fn get(&self, key: &CacheKey) -> Option<ResponseEnvelope> {
        let hit = self.entries.get(key)?;
        if hit.is_expired() {
            drop(hit);
            self.entries.remove(key);
            return None;
        }
        Some(hit.envelope.clone())
    }

    pub fn put(&self, key: CacheKey, envelope: ResponseEnvelope) {
        self.entries.insert(
            key,
            CacheEntry {
                envelope,
                added_utc: Utc::now(),
                ttl_secs: self.default_ttl_secs,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn spawn_eviction_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(30)).await;
                self.entries.retain(|_, entry| !entry.is_expired());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EnvelopeMeta;
    use uuid::Uuid;

    fn sample_envelope() -> ResponseEnvelope {
        ResponseEnvelope {
            meta: EnvelopeMeta {
                as_of: Utc::now(),
                requested: serde_json::json!({}),
                applied: serde_json::json!({}),
                limits: serde_json::json!({}),
                rows_returned: 1,
                truncated: false,
                suggested_params: None,
            },
            data: serde_json::json!({"ok": true}),
        }
    }

    #[test]
    fn canonicalize_is_key_order_independent() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[tokio::test]
    async fn put_then_get_roundtrips_before_ttl() {
        let cache = ToolResultCache::new(600);
        let key = CacheKey::new(Uuid::new_v4(), "prices-quotes", &serde_json::json!({"symbols": ["AAPL"]}));
        cache.put(key.clone(), sample_envelope());
        assert!(cache.get(&key).is_some());
    }

    #[tokio::test]
    async fn expired_entry_is_not_served() {
        let cache = ToolResultCache::new(0);
        let key = CacheKey::new(Uuid::new_v4(), "prices-quotes", &serde_json::json!({"symbols": ["AAPL"]}));
        cache.entries.insert(
            key.clone(),
            CacheEntry {
                envelope: sample_envelope(),
                added_utc: Utc::now() - chrono::Duration::seconds(5),
                ttl_secs: 0,
            },
        );
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn distinct_conversations_do_not_share_a_key() {
        let args = serde_json::json!({"symbols": ["AAPL"]});
        let k1 = CacheKey::new(Uuid::new_v4(), "prices-quotes", &args);
        let k2 = CacheKey::new(Uuid::new_v4(), "prices-quotes", &args);
        assert_ne!(k1, k2);
    }
}
