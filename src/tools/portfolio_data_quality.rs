//! `portfolio-data-quality` (SPEC_FULL.md §3.2): surfaces data-quality
//! issues (missing prices, stale positions, unmapped symbols) for a
//! portfolio without returning the portfolio's actual holdings.

use super::{cache_lookup, finish_success, input_error, upstream_error, Cache, Client, Config};
use crate::cache::CacheKey;
use crate::models::{ToolContext, ToolDescriptor, ToolResult};

pub fn descriptor(_config: &crate::config::AgentServerConfig) -> ToolDescriptor {
    ToolDescriptor::new(
        "portfolio-data-quality",
        "Reports data-quality issues for a portfolio: missing prices, stale positions, unmapped symbols.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "portfolio_id": {"type": "string"}
            },
            "required": ["portfolio_id"]
        }),
    )
}

pub async fn handle(args: serde_json::Value, ctx: ToolContext, client: Client, cache: Cache, _config: Config) -> ToolResult {
    let portfolio_id = match args.get("portfolio_id").and_then(|v| v.as_str()) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return input_error("portfolio_id is required"),
    };

    let key = CacheKey::new(ctx.conversation_id, "portfolio-data-quality", &serde_json::json!({"portfolio_id": portfolio_id}));
    if let Some(hit) = cache_lookup(&cache, &key) {
        return hit;
    }

    let data = match client.portfolio_data_quality(&portfolio_id).await {
        Ok(data) => data,
        Err(err) => return upstream_error(err),
    };

    let issue_count = data.get("issues").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);

    finish_success(
        &cache,
        key,
        &ctx,
        serde_json::json!({"portfolio_id": portfolio_id}),
        serde_json::json!({"portfolio_id": portfolio_id}),
        serde_json::json!({}),
        issue_count,
        false,
        None,
        data,
    )
}
