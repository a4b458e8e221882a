//! Configuration for the portfolio analytics agent server.
//!
//! Kept intentionally minimal, in the same spirit as this codebase's
//! previous `CloudLLMConfig`: a plain struct built by hand or from
//! environment variables, with no TOML/YAML parsing dependency.
//!
//! # Example
//!
//! ```rust
//! use sigmasight_agent::config::AgentServerConfig;
//!
//! let config = AgentServerConfig::default();
//! assert_eq!(config.tool_loop_max_rounds, 8);
//! ```

use std::collections::HashMap;

/// Process-wide configuration for the agent server.
///
/// Constructed once at startup via [`AgentServerConfig::from_env`] and
/// shared as an `Arc` across the conversation store, orchestrator, and
/// tool registry. Never mutated after startup; config changes require a
/// process restart (the factor ETF alias table is the one exception —
/// see [`crate::tool_registry::ToolRegistry::build`], which may overlay a
/// backend-sourced mapping on top of these defaults).
#[derive(Debug, Clone)]
pub struct AgentServerConfig {
    /// Primary model identifier sent to the LLM provider.
    pub model_id: String,
    /// Fallback model identifier used if the primary model call fails.
    pub model_fallback_id: String,
    /// Per-tool-call timeout enforced on the raw-data client (seconds).
    pub tool_request_timeout_secs: u64,
    /// SSE heartbeat interval, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Handler-level result cache TTL, in seconds.
    pub cache_ttl_secs: u64,
    /// Maximum accepted length of a turn's user text, in words.
    pub max_turn_text_len: usize,
    /// Tool-dispatch round cap before a turn fails with
    /// `tool_loop_budget_exceeded`.
    pub tool_loop_max_rounds: usize,
    /// Whole-turn wall-clock timeout, in seconds.
    pub turn_total_timeout_secs: u64,
    /// Per-user rate limit, requests per minute.
    pub rate_limit_per_minute: u32,
    /// Per-user token bucket burst capacity.
    pub rate_limit_burst: u32,
    /// Conversation inactivity GC interval, in hours.
    pub conversation_gc_after_hours: u64,

    /// Cap applied to `prices-quotes` symbol count.
    pub quotes_max_symbols: usize,
    /// Hard cap applied to `prices-historical` lookback_days.
    pub historical_max_lookback_days: u32,
    /// Default `prices-historical` lookback_days when unspecified.
    pub historical_default_lookback_days: u32,
    /// Cap applied to `prices-historical` symbol selection.
    pub historical_max_symbols: usize,
    /// Cap applied to `positions-details` rows returned.
    pub positions_max_rows: usize,
    /// Cap applied to `portfolio-complete` positions returned.
    pub portfolio_max_positions: usize,
    /// Default lookback for `factor-etf-prices`.
    pub factor_etf_default_lookback_days: u32,

    /// Default factor-name to ETF-symbol alias table.
    pub factor_etf_aliases: HashMap<String, String>,

    /// Base URL of the raw-data (portfolio data) backend.
    pub raw_data_backend_base_url: String,
    /// Shared-secret bearer token this server itself requires from callers.
    pub bearer_token: String,
    /// Cookie name accepted as a fallback on the streaming endpoint.
    pub streaming_cookie_name: String,
}

impl AgentServerConfig {
    /// Build configuration from environment variables, falling back to
    /// [`AgentServerConfig::default`] for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_id: env_or("AGENT_MODEL_ID", defaults.model_id),
            model_fallback_id: env_or("AGENT_MODEL_FALLBACK_ID", defaults.model_fallback_id),
            tool_request_timeout_secs: env_parsed(
                "AGENT_TOOL_REQUEST_TIMEOUT_SECS",
                defaults.tool_request_timeout_secs,
            ),
            heartbeat_interval_ms: env_parsed(
                "AGENT_HEARTBEAT_INTERVAL_MS",
                defaults.heartbeat_interval_ms,
            ),
            cache_ttl_secs: env_parsed("AGENT_CACHE_TTL_SECS", defaults.cache_ttl_secs),
            max_turn_text_len: env_parsed("AGENT_MAX_TURN_TEXT_LEN", defaults.max_turn_text_len),
            tool_loop_max_rounds: env_parsed(
                "AGENT_TOOL_LOOP_MAX_ROUNDS",
                defaults.tool_loop_max_rounds,
            ),
            turn_total_timeout_secs: env_parsed(
                "AGENT_TURN_TOTAL_TIMEOUT_SECS",
                defaults.turn_total_timeout_secs,
            ),
            rate_limit_per_minute: env_parsed(
                "AGENT_RATE_LIMIT_PER_MINUTE",
                defaults.rate_limit_per_minute,
            ),
            rate_limit_burst: env_parsed("AGENT_RATE_LIMIT_BURST", defaults.rate_limit_burst),
            conversation_gc_after_hours: env_parsed(
                "AGENT_CONVERSATION_GC_AFTER_HOURS",
                defaults.conversation_gc_after_hours,
            ),
            quotes_max_symbols: defaults.quotes_max_symbols,
            historical_max_lookback_days: defaults.historical_max_lookback_days,
            historical_default_lookback_days: defaults.historical_default_lookback_days,
            historical_max_symbols: defaults.historical_max_symbols,
            positions_max_rows: defaults.positions_max_rows,
            portfolio_max_positions: defaults.portfolio_max_positions,
            factor_etf_default_lookback_days: defaults.factor_etf_default_lookback_days,
            factor_etf_aliases: defaults.factor_etf_aliases,
            raw_data_backend_base_url: env_or(
                "AGENT_RAW_DATA_BACKEND_BASE_URL",
                defaults.raw_data_backend_base_url,
            ),
            bearer_token: env_or("AGENT_BEARER_TOKEN", defaults.bearer_token),
            streaming_cookie_name: env_or(
                "AGENT_STREAMING_COOKIE_NAME",
                defaults.streaming_cookie_name,
            ),
        }
    }
}

impl Default for AgentServerConfig {
    fn default() -> Self {
        let mut factor_etf_aliases = HashMap::new();
        factor_etf_aliases.insert("market".to_string(), "SPY".to_string());
        factor_etf_aliases.insert("value".to_string(), "VTV".to_string());
        factor_etf_aliases.insert("growth".to_string(), "VUG".to_string());
        factor_etf_aliases.insert("momentum".to_string(), "MTUM".to_string());
        factor_etf_aliases.insert("quality".to_string(), "QUAL".to_string());
        factor_etf_aliases.insert("size".to_string(), "SIZE".to_string());
        factor_etf_aliases.insert("low_volatility".to_string(), "USMV".to_string());

        Self {
            model_id: "gpt-4.1".to_string(),
            model_fallback_id: "gpt-4.1-mini".to_string(),
            tool_request_timeout_secs: 6,
            heartbeat_interval_ms: 15_000,
            cache_ttl_secs: 600,
            max_turn_text_len: 100,
            tool_loop_max_rounds: 8,
            turn_total_timeout_secs: 120,
            rate_limit_per_minute: 60,
            rate_limit_burst: 10,
            conversation_gc_after_hours: 24,
            quotes_max_symbols: 5,
            historical_max_lookback_days: 180,
            historical_default_lookback_days: 90,
            historical_max_symbols: 5,
            positions_max_rows: 200,
            portfolio_max_positions: 200,
            factor_etf_default_lookback_days: 150,
            factor_etf_aliases,
            raw_data_backend_base_url: "http://localhost:9000".to_string(),
            bearer_token: String::new(),
            streaming_cookie_name: "sigmasight_session".to_string(),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = AgentServerConfig::default();
        assert_eq!(cfg.tool_loop_max_rounds, 8);
        assert_eq!(cfg.historical_max_lookback_days, 180);
        assert_eq!(cfg.historical_default_lookback_days, 90);
        assert_eq!(cfg.quotes_max_symbols, 5);
        assert_eq!(cfg.historical_max_symbols, 5);
        assert_eq!(cfg.positions_max_rows, 200);
        assert_eq!(cfg.portfolio_max_positions, 200);
        assert_eq!(cfg.heartbeat_interval_ms, 15_000);
        assert_eq!(cfg.cache_ttl_secs, 600);
        assert_eq!(cfg.rate_limit_per_minute, 60);
        assert_eq!(cfg.rate_limit_burst, 10);
    }

    #[test]
    fn size_factor_defaults_to_size_not_sly() {
        let cfg = AgentServerConfig::default();
        assert_eq!(cfg.factor_etf_aliases.get("size"), Some(&"SIZE".to_string()));
    }
}
