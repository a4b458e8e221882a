//! The six read-only portfolio-analytics tool handlers (SPEC_FULL.md §3).
//!
//! Each submodule exposes `descriptor(config) -> ToolDescriptor` and an
//! async `handle(args, ctx, client, cache, config) -> ToolResult`, matching
//! the closure signature `tool_registry::ToolRegistry::build` wires up.
//! Cache-check-before-dispatch and cap-enforcement-by-truncation are
//! shared here rather than duplicated per handler, grounded on
//! `src/cloudllm/tool_protocols.rs::McpClientProtocol`'s pattern of
//! checking its TTL cache before making a call.

pub mod factor_etf_prices;
pub mod portfolio_complete;
pub mod portfolio_data_quality;
pub mod positions_details;
pub mod prices_historical;
pub mod prices_quotes;

use crate::cache::{CacheKey, ToolResultCache};
use crate::models::{EnvelopeMeta, ErrorEnvelope, ResponseEnvelope, ToolContext, ToolResult};
use std::sync::Arc;

/// Checks the cache for `key`; returns `Some` immediately on a hit.
pub(crate) fn cache_lookup(cache: &ToolResultCache, key: &CacheKey) -> Option<ToolResult> {
    cache.get(key).map(ToolResult::ok)
}

/// Builds the standard success envelope and stores it in the cache.
pub(crate) fn finish_success(
    cache: &ToolResultCache,
    key: CacheKey,
    ctx: &ToolContext,
    requested: serde_json::Value,
    applied: serde_json::Value,
    limits: serde_json::Value,
    rows_returned: usize,
    truncated: bool,
    suggested_params: Option<serde_json::Value>,
    data: serde_json::Value,
) -> ToolResult {
    let envelope = ResponseEnvelope {
        meta: EnvelopeMeta {
            as_of: ctx.as_of,
            requested,
            applied,
            limits,
            rows_returned,
            truncated,
            suggested_params,
        },
        data,
    };
    cache.put(key, envelope.clone());
    ToolResult::ok(envelope)
}

/// Builds a non-retryable input-validation failure.
pub(crate) fn input_error(message: impl Into<String>) -> ToolResult {
    ToolResult::failed(ErrorEnvelope {
        message: message.into(),
        retryable: false,
        suggested_params: None,
        request_id: uuid::Uuid::new_v4(),
    })
}

/// Converts an upstream [`crate::error::AgentError`] into a [`ToolResult`],
/// preserving its retryability so the orchestrator can tell the model
/// whether retrying the same tool call is worth attempting.
pub(crate) fn upstream_error(err: crate::error::AgentError) -> ToolResult {
    ToolResult::failed(ErrorEnvelope {
        message: err.to_string(),
        retryable: err.retryable(),
        suggested_params: None,
        request_id: uuid::Uuid::new_v4(),
    })
}

pub(crate) type Client = Arc<dyn crate::raw_data_client::RawDataClient>;
pub(crate) type Cache = Arc<ToolResultCache>;
pub(crate) type Config = Arc<crate::config::AgentServerConfig>;

/// Stub [`crate::raw_data_client::RawDataClient`] used only by handler unit
/// tests, returning fixed, minimal payloads so each handler's validation
/// and cap-enforcement logic can be tested without a live backend.
#[cfg(test)]
pub(crate) mod tests_support {
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    #[derive(Default)]
    pub struct StubClient;

    #[async_trait]
    impl crate::raw_data_client::RawDataClient for StubClient {
        async fn portfolio_complete(&self, portfolio_id: &str, _as_of: DateTime<Utc>) -> Result<serde_json::Value, crate::error::AgentError> {
            Ok(serde_json::json!({
                "portfolio_id": portfolio_id,
                "positions": [{"symbol": "AAPL", "weight": 0.5}, {"symbol": "MSFT", "weight": 0.5}]
            }))
        }

        async fn portfolio_data_quality(&self, portfolio_id: &str) -> Result<serde_json::Value, crate::error::AgentError> {
            Ok(serde_json::json!({"portfolio_id": portfolio_id, "issues": []}))
        }

        async fn positions_details(&self, portfolio_id: &str, _as_of: DateTime<Utc>) -> Result<serde_json::Value, crate::error::AgentError> {
            Ok(serde_json::json!({"portfolio_id": portfolio_id, "positions": [{"symbol": "AAPL", "quantity": 10}]}))
        }

        async fn prices_historical(&self, symbols: &[String], lookback_days: u32) -> Result<serde_json::Value, crate::error::AgentError> {
            Ok(serde_json::json!({"symbols": symbols, "lookback_days": lookback_days, "bars": []}))
        }

        async fn prices_quotes(&self, symbols: &[String]) -> Result<serde_json::Value, crate::error::AgentError> {
            Ok(serde_json::json!({"quotes": symbols.iter().map(|s| serde_json::json!({"symbol": s, "price": 100.0})).collect::<Vec<_>>()}))
        }

        async fn factor_etf_prices(&self, etf_symbols: &[String], lookback_days: u32) -> Result<serde_json::Value, crate::error::AgentError> {
            Ok(serde_json::json!({"symbols": etf_symbols, "lookback_days": lookback_days, "bars": []}))
        }
    }
}
