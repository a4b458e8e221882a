//! `prices-historical` (SPEC_FULL.md §3.4 / spec.md §4.3): historical
//! daily price bars for a portfolio's own positions, selected by policy
//! rather than named directly by the caller — up to `max_symbols`
//! (capped at 5), chosen by `selection_method` (`top_by_value` default,
//! `top_by_weight`, or `all`), optionally widened to include the
//! standard factor-proxy ETFs, capped at 180 lookback days (90-day
//! default). Truncates rather than rejects whenever a requested value
//! exceeds a cap.

use super::{cache_lookup, finish_success, input_error, upstream_error, Cache, Client, Config};
use crate::cache::CacheKey;
use crate::models::{ToolContext, ToolDescriptor, ToolResult};

pub fn descriptor(config: &crate::config::AgentServerConfig) -> ToolDescriptor {
    ToolDescriptor::new(
        "prices-historical",
        "Returns historical daily price bars for a portfolio's selected positions (up to 5 symbols), capped at 180 lookback days.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "portfolio_id": {"type": "string"},
                "max_symbols": {"type": "integer", "minimum": 1},
                "selection_method": {"type": "string", "enum": ["top_by_value", "top_by_weight", "all"]},
                "include_factor_etfs": {"type": "boolean"},
                "date_format": {"type": "string", "enum": ["iso", "unix"]},
                "lookback_days": {"type": "integer", "minimum": 1}
            },
            "required": ["portfolio_id"]
        }),
    )
    .with_cap("max_symbols", serde_json::json!(config.historical_max_symbols))
    .with_cap("max_lookback_days", serde_json::json!(config.historical_max_lookback_days))
    .with_cap("default_lookback_days", serde_json::json!(config.historical_default_lookback_days))
}

/// Extracts `(symbol, sort_key)` pairs from a portfolio snapshot's
/// `positions` array, defaulting a missing numeric field to 0 so a
/// partially-populated backend record still sorts deterministically.
fn position_sort_keys(positions: &[serde_json::Value], field: &str) -> Vec<(String, f64)> {
    positions
        .iter()
        .filter_map(|p| {
            let symbol = p.get("symbol")?.as_str()?.to_string();
            let key = p.get(field).and_then(|v| v.as_f64()).unwrap_or(0.0);
            Some((symbol, key))
        })
        .collect()
}

/// Applies `selection_method` to a portfolio's positions, returning the
/// selected symbols in priority order (most-preferred first) so the
/// caller can cap the list without re-sorting.
fn select_symbols(positions: &[serde_json::Value], selection_method: &str) -> Vec<String> {
    match selection_method {
        "top_by_weight" => {
            let mut ranked = position_sort_keys(positions, "weight");
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            ranked.into_iter().map(|(symbol, _)| symbol).collect()
        }
        "all" => positions.iter().filter_map(|p| p.get("symbol").and_then(|v| v.as_str()).map(str::to_string)).collect(),
        // top_by_value is the default selection policy.
        _ => {
            let mut ranked = position_sort_keys(positions, "market_value");
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            ranked.into_iter().map(|(symbol, _)| symbol).collect()
        }
    }
}

/// Rewrites each bar's `date` field from `YYYY-MM-DD` to a Unix day-start
/// timestamp when `date_format` is `"unix"`. Bars the backend didn't
/// stamp with a parseable date are left untouched rather than dropped.
fn apply_date_format(mut data: serde_json::Value, date_format: &str) -> serde_json::Value {
    if date_format != "unix" {
        return data;
    }
    if let Some(bars) = data.get_mut("bars").and_then(|v| v.as_array_mut()) {
        for bar in bars.iter_mut() {
            if let Some(date_str) = bar.get("date").and_then(|v| v.as_str()) {
                if let Ok(date) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
                    let timestamp = date.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
                    if let Some(obj) = bar.as_object_mut() {
                        obj.insert("date".to_string(), serde_json::json!(timestamp));
                    }
                }
            }
        }
    }
    data
}

pub async fn handle(args: serde_json::Value, ctx: ToolContext, client: Client, cache: Cache, config: Config) -> ToolResult {
    let portfolio_id = match args.get("portfolio_id").and_then(|v| v.as_str()) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return input_error("portfolio_id is required"),
    };

    let selection_method = args.get("selection_method").and_then(|v| v.as_str()).unwrap_or("top_by_value");
    if !["top_by_value", "top_by_weight", "all"].contains(&selection_method) {
        return input_error(format!("selection_method must be one of top_by_value, top_by_weight, all; got {}", selection_method));
    }

    let date_format = args.get("date_format").and_then(|v| v.as_str()).unwrap_or("iso");
    if !["iso", "unix"].contains(&date_format) {
        return input_error(format!("date_format must be one of iso, unix; got {}", date_format));
    }

    let include_factor_etfs = args.get("include_factor_etfs").and_then(|v| v.as_bool()).unwrap_or(false);

    let hard_cap = config.historical_max_symbols;
    let requested_max_symbols = args.get("max_symbols").and_then(|v| v.as_u64()).map(|v| v as usize).unwrap_or(hard_cap);
    let max_symbols = requested_max_symbols.min(hard_cap);

    let requested_lookback = args.get("lookback_days").and_then(|v| v.as_u64()).map(|v| v as u32);
    let default_lookback = config.historical_default_lookback_days;
    let max_lookback = config.historical_max_lookback_days;
    let requested_lookback_value = requested_lookback.unwrap_or(default_lookback);
    let applied_lookback = requested_lookback_value.min(max_lookback);

    let portfolio = match client.portfolio_complete(&portfolio_id, ctx.as_of).await {
        Ok(data) => data,
        Err(err) => return upstream_error(err),
    };
    let positions = portfolio.get("positions").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    let ranked_symbols = select_symbols(&positions, selection_method);

    let mut applied_symbols: Vec<String> = ranked_symbols.iter().take(max_symbols).cloned().collect();
    if include_factor_etfs {
        for etf in config.factor_etf_aliases.values() {
            if !applied_symbols.contains(etf) {
                applied_symbols.push(etf.clone());
            }
        }
    }
    let symbols_truncated = ranked_symbols.len() > max_symbols || applied_symbols.len() > max_symbols;
    applied_symbols.truncate(max_symbols);

    if applied_symbols.is_empty() {
        return input_error(format!("portfolio {} has no positions to select symbols from", portfolio_id));
    }

    let lookback_truncated = requested_lookback_value > max_lookback;
    let truncated = symbols_truncated || lookback_truncated || requested_max_symbols > hard_cap;

    let key = CacheKey::new(
        ctx.conversation_id,
        "prices-historical",
        &serde_json::json!({
            "portfolio_id": portfolio_id,
            "symbols": applied_symbols,
            "lookback_days": applied_lookback,
            "date_format": date_format,
        }),
    );
    if let Some(hit) = cache_lookup(&cache, &key) {
        return hit;
    }

    let data = match client.prices_historical(&applied_symbols, applied_lookback).await {
        Ok(data) => data,
        Err(err) => return upstream_error(err),
    };
    let data = apply_date_format(data, date_format);

    let rows_returned = data.get("bars").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);

    finish_success(
        &cache,
        key,
        &ctx,
        serde_json::json!({
            "portfolio_id": portfolio_id,
            "max_symbols": requested_max_symbols,
            "selection_method": selection_method,
            "include_factor_etfs": include_factor_etfs,
            "date_format": date_format,
            "lookback_days": requested_lookback_value,
        }),
        serde_json::json!({
            "portfolio_id": portfolio_id,
            "symbols": applied_symbols,
            "lookback_days": applied_lookback,
            "date_format": date_format,
        }),
        serde_json::json!({"max_symbols": hard_cap, "max_lookback_days": max_lookback}),
        rows_returned,
        truncated,
        truncated.then(|| serde_json::json!({"symbols": applied_symbols, "lookback_days": applied_lookback})),
        data,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentServerConfig;
    use chrono::Utc;

    fn ctx() -> ToolContext {
        ToolContext {
            conversation_id: uuid::Uuid::new_v4(),
            user_id: "u1".to_string(),
            request_id: uuid::Uuid::new_v4(),
            as_of: Utc::now(),
        }
    }

    #[tokio::test]
    async fn missing_portfolio_id_is_input_error() {
        let cache = crate::cache::ToolResultCache::new(600);
        let config = std::sync::Arc::new(AgentServerConfig::default());
        let client: Client = std::sync::Arc::new(crate::tools::tests_support::StubClient::default());
        let result = handle(serde_json::json!({}), ctx(), client, cache, config).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn defaults_to_top_by_value_selection() {
        let cache = crate::cache::ToolResultCache::new(600);
        let config = std::sync::Arc::new(AgentServerConfig::default());
        let client: Client = std::sync::Arc::new(crate::tools::tests_support::StubClient::default());
        let result = handle(serde_json::json!({"portfolio_id": "p1"}), ctx(), client, cache, config).await;
        assert!(result.success);
        let env = result.envelope.unwrap();
        assert_eq!(env.meta.applied.get("portfolio_id").unwrap(), "p1");
    }

    #[tokio::test]
    async fn lookback_days_clamped_to_hard_cap() {
        let cache = crate::cache::ToolResultCache::new(600);
        let config = std::sync::Arc::new(AgentServerConfig::default());
        let client: Client = std::sync::Arc::new(crate::tools::tests_support::StubClient::default());
        let result = handle(serde_json::json!({"portfolio_id": "p1", "lookback_days": 365}), ctx(), client, cache, config).await;
        let env = result.envelope.unwrap();
        assert!(env.meta.truncated);
        assert_eq!(env.meta.applied.get("lookback_days").unwrap(), &serde_json::json!(180));
    }

    #[tokio::test]
    async fn max_symbols_over_hard_cap_is_truncated() {
        let cache = crate::cache::ToolResultCache::new(600);
        let config = std::sync::Arc::new(AgentServerConfig::default());
        let client: Client = std::sync::Arc::new(crate::tools::tests_support::StubClient::default());
        let result = handle(serde_json::json!({"portfolio_id": "p1", "max_symbols": 50}), ctx(), client, cache, config).await;
        let env = result.envelope.unwrap();
        assert!(env.meta.truncated);
    }

    #[tokio::test]
    async fn invalid_selection_method_is_input_error() {
        let cache = crate::cache::ToolResultCache::new(600);
        let config = std::sync::Arc::new(AgentServerConfig::default());
        let client: Client = std::sync::Arc::new(crate::tools::tests_support::StubClient::default());
        let result = handle(serde_json::json!({"portfolio_id": "p1", "selection_method": "bogus"}), ctx(), client, cache, config).await;
        assert!(!result.success);
    }

    #[test]
    fn unix_date_format_converts_iso_dates() {
        let data = serde_json::json!({"bars": [{"date": "2024-01-02", "close": 100.0}]});
        let converted = apply_date_format(data, "unix");
        let date_value = converted["bars"][0]["date"].clone();
        assert!(date_value.is_number());
    }

    #[test]
    fn iso_date_format_leaves_data_untouched() {
        let data = serde_json::json!({"bars": [{"date": "2024-01-02", "close": 100.0}]});
        let converted = apply_date_format(data.clone(), "iso");
        assert_eq!(converted, data);
    }

    #[test]
    fn top_by_weight_sorts_descending() {
        let positions = vec![
            serde_json::json!({"symbol": "LOW", "weight": 0.1}),
            serde_json::json!({"symbol": "HIGH", "weight": 0.9}),
        ];
        let selected = select_symbols(&positions, "top_by_weight");
        assert_eq!(selected, vec!["HIGH".to_string(), "LOW".to_string()]);
    }
}
