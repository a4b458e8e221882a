//! `factor-etf-prices` (SPEC_FULL.md §3.6): price history for factor-proxy
//! ETFs, addressed either by raw ticker or by factor alias name (`market`,
//! `value`, `growth`, `momentum`, `quality`, `size`, `low_volatility`).
//! The alias table defaults to SIZE for the `size` factor (not SLY),
//! matching the resolved Open Question in SPEC_FULL.md, and may be
//! overridden at startup by a backend-sourced mapping.

use super::{cache_lookup, finish_success, upstream_error, Cache, Client, Config};
use crate::cache::CacheKey;
use crate::models::{ToolContext, ToolDescriptor, ToolResult};

pub fn descriptor(config: &crate::config::AgentServerConfig) -> ToolDescriptor {
    ToolDescriptor::new(
        "factor-etf-prices",
        "Returns price history for factor-proxy ETFs, addressed by ticker or factor alias (market, value, growth, momentum, quality, size, low_volatility).",
        serde_json::json!({
            "type": "object",
            "properties": {
                "factors": {"type": "array", "items": {"type": "string"}, "minItems": 1},
                "lookback_days": {"type": "integer", "minimum": 1}
            }
        }),
    )
    .with_cap("default_lookback_days", serde_json::json!(config.factor_etf_default_lookback_days))
    .with_cap("aliases", serde_json::to_value(&config.factor_etf_aliases).unwrap_or_default())
}

fn resolve_symbol(requested: &str, aliases: &std::collections::HashMap<String, String>) -> String {
    aliases.get(&requested.to_ascii_lowercase()).cloned().unwrap_or_else(|| requested.to_ascii_uppercase())
}

pub async fn handle(args: serde_json::Value, ctx: ToolContext, client: Client, cache: Cache, config: Config) -> ToolResult {
    // `factors` is optional; omitting it (or passing an empty array) means
    // "every known factor", not an error.
    let requested_factors: Vec<String> = match args.get("factors").and_then(|v| v.as_array()) {
        Some(items) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        None => Vec::new(),
    };

    let effective_factors: Vec<String> = if requested_factors.is_empty() {
        let mut names: Vec<String> = config.factor_etf_aliases.keys().cloned().collect();
        names.sort();
        names
    } else {
        requested_factors.clone()
    };

    let resolved_symbols: Vec<String> = effective_factors.iter().map(|f| resolve_symbol(f, &config.factor_etf_aliases)).collect();

    let requested_lookback = args.get("lookback_days").and_then(|v| v.as_u64()).map(|v| v as u32);
    let default_lookback = config.factor_etf_default_lookback_days;
    let applied_lookback = requested_lookback.unwrap_or(default_lookback);

    let key = CacheKey::new(
        ctx.conversation_id,
        "factor-etf-prices",
        &serde_json::json!({"symbols": resolved_symbols, "lookback_days": applied_lookback}),
    );
    if let Some(hit) = cache_lookup(&cache, &key) {
        return hit;
    }

    let data = match client.factor_etf_prices(&resolved_symbols, applied_lookback).await {
        Ok(data) => data,
        Err(err) => return upstream_error(err),
    };

    let rows_returned = data.get("bars").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);

    finish_success(
        &cache,
        key,
        &ctx,
        serde_json::json!({"factors": (!requested_factors.is_empty()).then_some(&requested_factors), "lookback_days": requested_lookback}),
        serde_json::json!({"symbols": resolved_symbols, "lookback_days": applied_lookback}),
        serde_json::json!({"default_lookback_days": default_lookback}),
        rows_returned,
        false,
        None,
        data,
    )
}
