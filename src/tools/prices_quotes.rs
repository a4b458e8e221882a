//! `prices-quotes` (SPEC_FULL.md §3.5): latest quote for up to 5 symbols,
//! truncating silently past the cap rather than rejecting the call.

use super::{cache_lookup, finish_success, input_error, upstream_error, Cache, Client, Config};
use crate::cache::CacheKey;
use crate::models::{ToolContext, ToolDescriptor, ToolResult};

pub fn descriptor(config: &crate::config::AgentServerConfig) -> ToolDescriptor {
    ToolDescriptor::new(
        "prices-quotes",
        "Returns the latest quote for up to 5 symbols.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "symbols": {"type": "array", "items": {"type": "string"}, "minItems": 1}
            },
            "required": ["symbols"]
        }),
    )
    .with_cap("max_symbols", serde_json::json!(config.quotes_max_symbols))
}

pub async fn handle(args: serde_json::Value, ctx: ToolContext, client: Client, cache: Cache, config: Config) -> ToolResult {
    let requested_symbols: Vec<String> = match args.get("symbols").and_then(|v| v.as_array()) {
        Some(items) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        None => return input_error("symbols is required: a non-empty array of ticker strings"),
    };

    if requested_symbols.is_empty() {
        return input_error("symbols must not be empty");
    }

    let max_symbols = config.quotes_max_symbols;
    let truncated = requested_symbols.len() > max_symbols;
    let applied_symbols: Vec<String> = requested_symbols.iter().take(max_symbols).cloned().collect();

    let key = CacheKey::new(ctx.conversation_id, "prices-quotes", &serde_json::json!({"symbols": applied_symbols}));
    if let Some(hit) = cache_lookup(&cache, &key) {
        return hit;
    }

    let data = match client.prices_quotes(&applied_symbols).await {
        Ok(data) => data,
        Err(err) => return upstream_error(err),
    };

    let rows_returned = data.get("quotes").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);

    finish_success(
        &cache,
        key,
        &ctx,
        serde_json::json!({"symbols": requested_symbols}),
        serde_json::json!({"symbols": applied_symbols}),
        serde_json::json!({"max_symbols": max_symbols}),
        rows_returned,
        truncated,
        truncated.then(|| serde_json::json!({"symbols": requested_symbols[max_symbols..].to_vec(), "note": "dropped symbols; split into a follow-up call"})),
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
    async fn six_symbols_truncated_to_five() {
        let cache = crate::cache::ToolResultCache::new(600);
        let config = std::sync::Arc::new(AgentServerConfig::default());
        let client: Client = std::sync::Arc::new(crate::tools::tests_support::StubClient::default());
        let symbols: Vec<String> = ["AAPL", "MSFT", "GOOG", "AMZN", "META", "NFLX"].iter().map(|s| s.to_string()).collect();
        let result = handle(serde_json::json!({"symbols": symbols}), ctx(), client, cache, config).await;
        let env = result.envelope.unwrap();
        assert!(env.meta.truncated);
        assert_eq!(env.meta.applied.get("symbols").unwrap().as_array().unwrap().len(), 5);
        let suggested = env.meta.suggested_params.unwrap();
        let dropped = suggested.get("symbols").unwrap().as_array().unwrap();
        assert_eq!(dropped, &vec![serde_json::json!("NFLX")]);
    }

    #[tokio::test]
    async fn empty_symbols_is_input_error() {
        let cache = crate::cache::ToolResultCache::new(600);
        let config = std::sync::Arc::new(AgentServerConfig::default());
        let client: Client = std::sync::Arc::new(crate::tools::tests_support::StubClient::default());
        let result = handle(serde_json::json!({"symbols": []}), ctx(), client, cache, config).await;
        assert!(!result.success);
    }
}
