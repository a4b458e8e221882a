//! Shared data model (SPEC_FULL.md §9).
//!
//! Grounded on the shape of this codebase's `ToolMetadata`/`ToolParameter`
//! (builder-style `with_*` methods, `HashMap<String, serde_json::Value>`
//! for open-ended metadata bags) and `client_wrapper::Message` (`Arc<str>`
//! for cheap clone of conversation text).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque identifier for a conversation.
pub type ConversationId = Uuid;

/// Opaque identifier for the owning user, as asserted by the auth gate.
pub type UserId = String;

/// Conversational mode, selected at conversation creation and changeable
/// mid-conversation via an in-text `/mode <color>` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Green,
    Blue,
    Indigo,
    Violet,
}

impl Mode {
    /// Default mode assigned to newly created conversations.
    pub const DEFAULT: Mode = Mode::Green;

    /// Parse a `/mode <color>` command body (already stripped of the
    /// leading `/mode ` prefix). Returns `None` for anything that isn't
    /// one of the four recognized colors, in which case the command is
    /// left untouched and passed through to the model.
    pub fn parse(word: &str) -> Option<Mode> {
        match word.trim().to_ascii_lowercase().as_str() {
            "green" => Some(Mode::Green),
            "blue" => Some(Mode::Blue),
            "indigo" => Some(Mode::Indigo),
            "violet" => Some(Mode::Violet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Green => "green",
            Mode::Blue => "blue",
            Mode::Indigo => "indigo",
            Mode::Violet => "violet",
        }
    }
}

/// A single turn (one user message plus the assistant's final response)
/// retained in a conversation's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub user_text: Arc<str>,
    pub assistant_text: Arc<str>,
    pub mode: Mode,
    pub created_at: DateTime<Utc>,
    pub tool_invocations: Vec<ToolInvocation>,
}

/// A reference to the LLM provider session backing a conversation.
///
/// Exactly one per conversation (data-model invariant from SPEC_FULL.md
/// §9); carried as an opaque string since provider session handles are
/// not standardized across vendors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRef {
    pub provider_name: String,
    pub session_handle: String,
}

/// A conversation record — the unit of ownership, mutation, and per-turn
/// locking in the conversation store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub owner_user_id: UserId,
    pub provider_ref: ProviderRef,
    pub mode: Mode,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(owner_user_id: UserId, provider_ref: ProviderRef) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_user_id,
            provider_ref,
            mode: Mode::DEFAULT,
            turns: Vec::new(),
            created_at: now,
            last_active_at: now,
        }
    }
}

/// A single recorded tool invocation within a turn, for audit/debugging
/// and for surfacing `tool_call`/`tool_result` stream events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub args: serde_json::Value,
    pub result: ToolResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// The outcome of executing one tool call.
///
/// Modeled directly on this codebase's `ToolResult`: failures are values,
/// not `Err`, so the orchestrator can inject them back into the model
/// instead of treating every tool hiccup as fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub envelope: Option<ResponseEnvelope>,
    pub error: Option<ErrorEnvelope>,
}

impl ToolResult {
    pub fn ok(envelope: ResponseEnvelope) -> Self {
        Self { success: true, envelope: Some(envelope), error: None }
    }

    pub fn failed(error: ErrorEnvelope) -> Self {
        Self { success: false, envelope: None, error: Some(error) }
    }
}

/// Metadata block attached to every successful tool response, per
/// SPEC_FULL.md §9's invariant that `meta` is always complete and
/// `applied ⊆ limits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    /// UTC instant the underlying data reflects.
    pub as_of: DateTime<Utc>,
    /// The parameters as requested by the caller (post-default-fill, pre-cap).
    pub requested: serde_json::Value,
    /// The parameters actually applied after cap enforcement.
    pub applied: serde_json::Value,
    /// The cap limits in force for this call.
    pub limits: serde_json::Value,
    /// Number of rows/items actually returned.
    pub rows_returned: usize,
    /// Whether any requested parameter was truncated to fit a cap.
    /// Meaningful even when `false` — an explicit "no truncation occurred".
    pub truncated: bool,
    /// If truncated, parameters a follow-up call could use to page through
    /// the remainder (e.g. `{"window": "180d"}`).
    pub suggested_params: Option<serde_json::Value>,
}

/// A successful, normalized tool response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub meta: EnvelopeMeta,
    pub data: serde_json::Value,
}

/// A failed tool response, never raised as a Rust `Err` past the handler
/// boundary — always carried as a value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub message: String,
    pub retryable: bool,
    pub suggested_params: Option<serde_json::Value>,
    pub request_id: Uuid,
}

/// Context passed to every tool handler invocation: enough to key the
/// per-conversation cache and to log with correlation ids, without giving
/// handlers access to the full conversation record.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub request_id: Uuid,
    pub as_of: DateTime<Utc>,
}

/// A descriptor for one registered tool — the anti-corruption boundary
/// between the LLM's native function-calling surface and this crate's
/// handler implementations.
#[derive(Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub json_schema: serde_json::Value,
    pub caps: HashMap<String, serde_json::Value>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, json_schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            json_schema,
            caps: HashMap::new(),
        }
    }

    pub fn with_cap(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.caps.insert(key.into(), value);
        self
    }
}

/// Events multiplexed over the SSE stream (SPEC_FULL.md §7 / spec.md §6.2).
///
/// `Delta` is serialized without an `event:` line (the unnamed/default SSE
/// case); every other variant carries its own `event:` name matching the
/// enum's snake_case tag.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    Start {},
    Delta { delta: String },
    ModeChanged { mode: Mode },
    ToolCall { name: String, args: serde_json::Value },
    ToolResult {
        name: String,
        meta: Option<EnvelopeMeta>,
        preview: Option<String>,
    },
    Error { message: String, reason: String },
    Done {},
}

/// A single cache entry in the per-conversation TTL cache (§3.7).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub envelope: ResponseEnvelope,
    pub added_utc: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        let expiry = self.added_utc + chrono::Duration::seconds(self.ttl_secs as i64);
        Utc::now() > expiry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parse_recognizes_four_colors() {
        assert_eq!(Mode::parse("green"), Some(Mode::Green));
        assert_eq!(Mode::parse("BLUE"), Some(Mode::Blue));
        assert_eq!(Mode::parse(" indigo "), Some(Mode::Indigo));
        assert_eq!(Mode::parse("violet"), Some(Mode::Violet));
        assert_eq!(Mode::parse("purple"), None);
    }

    #[test]
    fn new_conversation_defaults_to_green() {
        let conv = Conversation::new(
            "user-1".to_string(),
            ProviderRef { provider_name: "openai".to_string(), session_handle: "sess-1".to_string() },
        );
        assert_eq!(conv.mode, Mode::Green);
        assert!(conv.turns.is_empty());
    }

    #[test]
    fn cache_entry_expiry() {
        let entry = CacheEntry {
            envelope: ResponseEnvelope {
                meta: EnvelopeMeta {
                    as_of: Utc::now(),
                    requested: serde_json::json!({}),
                    applied: serde_json::json!({}),
                    limits: serde_json::json!({}),
                    rows_returned: 0,
                    truncated: false,
                    suggested_params: None,
                },
                data: serde_json::json!({}),
            },
            added_utc: Utc::now() - chrono::Duration::seconds(1000),
            ttl_secs: 600,
        };
        assert!(entry.is_expired());
    }
}
