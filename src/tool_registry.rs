//! Tool Registry (SPEC_FULL.md §2): the closed set of six tools exposed to
//! the LLM, and the single dispatch entry point the orchestrator calls.
//!
//! Simplified from `src/cloudllm/tool_protocol.rs::ToolRegistry`: that
//! registry routes across an open set of pluggable `ToolProtocol`
//! implementations (bash, filesystem, memory, MCP-backed...). This crate
//! has exactly one backend and a closed, spec-fixed tool set, so the
//! registry degenerates to a name-indexed map of handler functions rather
//! than a protocol-routing table.

use crate::config::AgentServerConfig;
use crate::models::{ErrorEnvelope, ToolContext, ToolDescriptor, ToolResult};
use crate::raw_data_client::RawDataClient;
use crate::tools;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

type HandlerFn = Arc<
    dyn Fn(
            serde_json::Value,
            ToolContext,
            Arc<dyn RawDataClient>,
            Arc<crate::cache::ToolResultCache>,
            Arc<AgentServerConfig>,
        ) -> BoxFuture<ToolResult>
        + Send
        + Sync,
>;

/// The closed registry of the six portfolio-analytics tools.
///
/// Built once at startup via [`ToolRegistry::build`] and shared as an
/// `Arc` with the orchestrator; never mutated afterward.
pub struct ToolRegistry {
    descriptors: Vec<ToolDescriptor>,
    handlers: HashMap<String, HandlerFn>,
}

impl ToolRegistry {
    /// Construct the fixed registry. `config` supplies the caps baked
    /// into each tool's descriptor and the factor ETF alias table, which
    /// may be overlaid with a backend-sourced mapping at startup (see
    /// SPEC_FULL.md §3.6) without changing the shape of this method.
    pub fn build(config: &AgentServerConfig) -> Self {
        let mut descriptors = Vec::new();
        let mut handlers: HashMap<String, HandlerFn> = HashMap::new();

        macro_rules! register {
            ($descriptor:expr, $handler:expr) => {{
                let descriptor: ToolDescriptor = $descriptor;
                handlers.insert(descriptor.name.clone(), Arc::new($handler));
                descriptors.push(descriptor);
            }};
        }

        register!(tools::portfolio_complete::descriptor(config), |args, ctx, client, cache, cfg| {
            Box::pin(tools::portfolio_complete::handle(args, ctx, client, cache, cfg)) as BoxFuture<ToolResult>
        });
        register!(tools::portfolio_data_quality::descriptor(config), |args, ctx, client, cache, cfg| {
            Box::pin(tools::portfolio_data_quality::handle(args, ctx, client, cache, cfg)) as BoxFuture<ToolResult>
        });
        register!(tools::positions_details::descriptor(config), |args, ctx, client, cache, cfg| {
            Box::pin(tools::positions_details::handle(args, ctx, client, cache, cfg)) as BoxFuture<ToolResult>
        });
        register!(tools::prices_historical::descriptor(config), |args, ctx, client, cache, cfg| {
            Box::pin(tools::prices_historical::handle(args, ctx, client, cache, cfg)) as BoxFuture<ToolResult>
        });
        register!(tools::prices_quotes::descriptor(config), |args, ctx, client, cache, cfg| {
            Box::pin(tools::prices_quotes::handle(args, ctx, client, cache, cfg)) as BoxFuture<ToolResult>
        });
        register!(tools::factor_etf_prices::descriptor(config), |args, ctx, client, cache, cfg| {
            Box::pin(tools::factor_etf_prices::handle(args, ctx, client, cache, cfg)) as BoxFuture<ToolResult>
        });

        Self { descriptors, handlers }
    }

    /// Snapshot of every tool descriptor, handed to the provider adapter
    /// when it builds the LLM's native function-calling schema.
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Dispatch one tool call. An unknown tool name is represented as a
    /// failed [`ToolResult`], not a Rust `Err` — per SPEC_FULL.md §6, the
    /// orchestrator injects this back into the model rather than failing
    /// the turn.
    pub async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: ToolContext,
        client: Arc<dyn RawDataClient>,
        cache: Arc<crate::cache::ToolResultCache>,
        config: Arc<AgentServerConfig>,
    ) -> ToolResult {
        match self.handlers.get(name) {
            Some(handler) => handler(args, ctx, client, cache, config).await,
            None => ToolResult::failed(ErrorEnvelope {
                message: format!("unknown tool: {}", name),
                retryable: false,
                suggested_params: None,
                request_id: Uuid::new_v4(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_exposes_exactly_six_tools() {
        let config = AgentServerConfig::default();
        let registry = ToolRegistry::build(&config);
        assert_eq!(registry.descriptors().len(), 6);
        for name in [
            "portfolio-complete",
            "portfolio-data-quality",
            "positions-details",
            "prices-historical",
            "prices-quotes",
            "factor-etf-prices",
        ] {
            assert!(registry.has_tool(name), "missing tool {}", name);
        }
        assert!(!registry.has_tool("bash"));
    }
}
