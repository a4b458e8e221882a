//! `portfolio-complete` (SPEC_FULL.md §3.1): full portfolio snapshot —
//! holdings, weights, and summary metrics as of a given date.

use super::{cache_lookup, finish_success, input_error, upstream_error, Cache, Client, Config};
use crate::cache::CacheKey;
use crate::models::{ToolContext, ToolDescriptor, ToolResult};
use chrono::Utc;

pub fn descriptor(config: &crate::config::AgentServerConfig) -> ToolDescriptor {
    ToolDescriptor::new(
        "portfolio-complete",
        "Returns the full portfolio snapshot (holdings, weights, summary metrics) as of a given date.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "portfolio_id": {"type": "string"},
                "as_of": {"type": "string", "format": "date", "description": "Defaults to today (UTC) when omitted."},
                "include_positions": {"type": "boolean", "description": "Defaults to true."},
                "include_cash": {"type": "boolean", "description": "Defaults to true."}
            },
            "required": ["portfolio_id"]
        }),
    )
    .with_cap("max_positions", serde_json::json!(config.portfolio_max_positions))
}

pub async fn handle(args: serde_json::Value, ctx: ToolContext, client: Client, cache: Cache, config: Config) -> ToolResult {
    let portfolio_id = match args.get("portfolio_id").and_then(|v| v.as_str()) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return input_error("portfolio_id is required"),
    };

    let as_of = match args.get("as_of").and_then(|v| v.as_str()) {
        Some(raw) => match chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => date.and_hms_opt(0, 0, 0).unwrap().and_utc(),
            Err(_) => return input_error(format!("as_of is not a valid YYYY-MM-DD date: {}", raw)),
        },
        None => ctx.as_of,
    };

    let include_positions = args.get("include_positions").and_then(|v| v.as_bool()).unwrap_or(true);
    let include_cash = args.get("include_cash").and_then(|v| v.as_bool()).unwrap_or(true);

    let key = CacheKey::new(
        ctx.conversation_id,
        "portfolio-complete",
        &serde_json::json!({
            "portfolio_id": portfolio_id,
            "as_of": as_of.to_rfc3339(),
            "include_positions": include_positions,
            "include_cash": include_cash,
        }),
    );
    if let Some(hit) = cache_lookup(&cache, &key) {
        return hit;
    }

    let data = match client.portfolio_complete(&portfolio_id, as_of).await {
        Ok(data) => data,
        Err(err) => return upstream_error(err),
    };

    let max_positions = config.portfolio_max_positions;
    let positions = data.get("positions").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    let truncated = include_positions && positions.len() > max_positions;
    let kept_positions = if include_positions { positions.into_iter().take(max_positions).collect() } else { Vec::new() };
    let rows_returned = kept_positions.len();

    let mut shaped = data.clone();
    if let Some(obj) = shaped.as_object_mut() {
        obj.insert("positions".to_string(), serde_json::Value::Array(kept_positions));
        if !include_cash {
            obj.remove("cash");
        }
    }

    finish_success(
        &cache,
        key,
        &ctx,
        serde_json::json!({
            "portfolio_id": portfolio_id,
            "as_of": as_of.to_rfc3339(),
            "include_positions": include_positions,
            "include_cash": include_cash,
        }),
        serde_json::json!({
            "portfolio_id": portfolio_id,
            "as_of": as_of.to_rfc3339(),
            "max_positions": max_positions,
            "include_positions": include_positions,
            "include_cash": include_cash,
        }),
        serde_json::json!({"max_positions": max_positions}),
        rows_returned,
        truncated,
        truncated.then(|| serde_json::json!({"note": "positions truncated to max_positions"})),
        shaped,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentServerConfig;

    #[test]
    fn descriptor_carries_max_positions_cap() {
        let config = AgentServerConfig::default();
        let d = descriptor(&config);
        assert_eq!(d.caps.get("max_positions"), Some(&serde_json::json!(200)));
    }

    #[tokio::test]
    async fn missing_portfolio_id_is_input_error() {
        let cache = crate::cache::ToolResultCache::new(600);
        let config = std::sync::Arc::new(AgentServerConfig::default());
        let client: Client = std::sync::Arc::new(crate::tools::tests_support::StubClient::default());
        let ctx = ToolContext {
            conversation_id: uuid::Uuid::new_v4(),
            user_id: "u1".to_string(),
            request_id: uuid::Uuid::new_v4(),
            as_of: Utc::now(),
        };
        let result = handle(serde_json::json!({}), ctx, client, cache, config).await;
        assert!(!result.success);
        assert!(!result.error.unwrap().retryable);
    }

    #[tokio::test]
    async fn include_positions_and_include_cash_default_to_true() {
        let cache = crate::cache::ToolResultCache::new(600);
        let config = std::sync::Arc::new(AgentServerConfig::default());
        let client: Client = std::sync::Arc::new(crate::tools::tests_support::StubClient::default());
        let ctx = ToolContext {
            conversation_id: uuid::Uuid::new_v4(),
            user_id: "u1".to_string(),
            request_id: uuid::Uuid::new_v4(),
            as_of: Utc::now(),
        };
        let result = handle(serde_json::json!({"portfolio_id": "p1"}), ctx, client, cache, config).await;
        let env = result.envelope.unwrap();
        assert_eq!(env.meta.applied.get("include_positions").unwrap(), &serde_json::json!(true));
        assert_eq!(env.meta.applied.get("include_cash").unwrap(), &serde_json::json!(true));
    }

    #[tokio::test]
    async fn include_positions_false_omits_position_rows() {
        let cache = crate::cache::ToolResultCache::new(600);
        let config = std::sync::Arc::new(AgentServerConfig::default());
        let client: Client = std::sync::Arc::new(crate::tools::tests_support::StubClient::default());
        let ctx = ToolContext {
            conversation_id: uuid::Uuid::new_v4(),
            user_id: "u1".to_string(),
            request_id: uuid::Uuid::new_v4(),
            as_of: Utc::now(),
        };
        let result = handle(serde_json::json!({"portfolio_id": "p1", "include_positions": false}), ctx, client, cache, config).await;
        let env = result.envelope.unwrap();
        assert_eq!(env.data.get("positions").and_then(|v| v.as_array()).map(|a| a.len()), Some(0));
    }
}
