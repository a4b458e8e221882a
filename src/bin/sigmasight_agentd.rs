//! Binary entrypoint: wires config, the conversation store, the tool
//! registry, and the axum server together, then serves until killed.

use sigmasight_agent::auth::{AuthState, RateLimiter};
use sigmasight_agent::cache::ToolResultCache;
use sigmasight_agent::config::AgentServerConfig;
use sigmasight_agent::conversation_store::ConversationStore;
use sigmasight_agent::orchestrator::Orchestrator;
use sigmasight_agent::raw_data_client::HttpRawDataClient;
use sigmasight_agent::server::{build_router, AppState};
use sigmasight_agent::tool_registry::ToolRegistry;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = Arc::new(AgentServerConfig::from_env());

    if config.bearer_token.is_empty() {
        log::warn!("AGENT_BEARER_TOKEN is unset; every request will be rejected with 401");
    }

    let conversations = ConversationStore::new(config.conversation_gc_after_hours);
    let cache = ToolResultCache::new(config.cache_ttl_secs);
    let tools = Arc::new(ToolRegistry::build(&config));
    let raw_data_client = Arc::new(HttpRawDataClient::new(
        config.raw_data_backend_base_url.clone(),
        config.tool_request_timeout_secs,
    ));

    let provider = load_provider(&config);

    let orchestrator = Arc::new(Orchestrator {
        conversations: conversations.clone(),
        tools,
        raw_data_client,
        cache,
        config: config.clone(),
        provider,
    });

    let auth_state = AuthState {
        config: config.clone(),
        rate_limiter: RateLimiter::new(config.rate_limit_per_minute, config.rate_limit_burst),
    };

    let app = build_router(AppState { conversations, orchestrator, config: config.clone() }, auth_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    log::info!("sigmasight-agentd listening on 0.0.0.0:8080");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}

/// Resolves the configured LLM provider adapter. Deployments supply their
/// own [`sigmasight_agent::provider::LlmProvider`] implementation for
/// whichever vendor they're running against; this entrypoint ships
/// without one wired in, since the provider is an external collaborator
/// this crate deliberately does not bundle (see SPEC_FULL.md Non-goals).
fn load_provider(_config: &AgentServerConfig) -> Arc<dyn sigmasight_agent::provider::LlmProvider> {
    log::error!("no LlmProvider wired in — construct one and pass it to Orchestrator::provider before running this binary against a real deployment");
    std::process::exit(1);
}
