//! Crate-wide error taxonomy.
//!
//! Mirrors the shape of [`crate::tool_registry::ToolError`] (itself a
//! generalization of this codebase's tool-protocol error enum): a plain
//! enum implementing [`std::error::Error`] rather than a derive-macro
//! based error type, so callers can match on the taxonomy instead of
//! stringly-typed messages.
//!
//! An [`AgentError`] is the terminal representation of anything that ends
//! a turn early. Tool-level failures never reach this type — they are
//! represented as a [`crate::models::ToolResult`] with `success: false`
//! and injected back into the model, per the failure semantics in
//! SPEC_FULL.md §6.

use std::fmt;

/// Taxonomy of failures that can terminate a turn or reject a request,
/// matching SPEC_FULL.md §7.
#[derive(Debug, Clone)]
pub enum AgentError {
    /// A request failed schema validation or referenced a conversation
    /// the caller does not own. Non-retryable.
    Input(String),
    /// Missing or invalid bearer token / cookie.
    Auth(String),
    /// The caller's token bucket is empty.
    RateLimited { retry_after_secs: u64 },
    /// A transient upstream fault (timeout, 5xx, 429) survived all retry
    /// attempts. Retryable — callers should back off and try again.
    UpstreamTransient(String),
    /// A non-retryable upstream fault (4xx other than 429, malformed
    /// response body).
    UpstreamPermanent(String),
    /// The LLM provider's stream dropped mid-turn after the one
    /// permitted retry.
    ProviderStream(String),
    /// The tool-dispatch round counter exceeded its configured cap.
    Budget { rounds: usize },
    /// The client disconnected before the turn completed.
    Cancelled,
}

impl AgentError {
    /// Whether a client may reasonably retry the same request unchanged.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            AgentError::RateLimited { .. } | AgentError::UpstreamTransient(_)
        )
    }

    /// Stable machine-readable reason tag used in `error { reason }` stream
    /// events and in [`crate::models::ErrorEnvelope`].
    pub fn reason(&self) -> &'static str {
        match self {
            AgentError::Input(_) => "input",
            AgentError::Auth(_) => "auth",
            AgentError::RateLimited { .. } => "rate_limited",
            AgentError::UpstreamTransient(_) => "upstream_transient",
            AgentError::UpstreamPermanent(_) => "upstream_permanent",
            AgentError::ProviderStream(_) => "provider_stream",
            AgentError::Budget { .. } => "tool_loop_budget_exceeded",
            AgentError::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::Input(msg) => write!(f, "input error: {}", msg),
            AgentError::Auth(msg) => write!(f, "auth error: {}", msg),
            AgentError::RateLimited { retry_after_secs } => {
                write!(f, "rate limited, retry after {}s", retry_after_secs)
            }
            AgentError::UpstreamTransient(msg) => write!(f, "upstream transient error: {}", msg),
            AgentError::UpstreamPermanent(msg) => write!(f, "upstream permanent error: {}", msg),
            AgentError::ProviderStream(msg) => write!(f, "provider stream error: {}", msg),
            AgentError::Budget { rounds } => {
                write!(f, "tool dispatch loop exceeded {} rounds", rounds)
            }
            AgentError::Cancelled => write!(f, "turn cancelled"),
        }
    }
}

impl std::error::Error for AgentError {}
