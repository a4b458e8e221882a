//! HTTP wiring: assembles the axum [`Router`] for the two external
//! endpoints (create-conversation, send-turn) and runs it under
//! `axum::serve`.
//!
//! Grounded on `src/cloudllm/mcp_http_adapter.rs::AxumHttpAdapter`'s route
//! building and `axum::serve` startup conventions, with the auth/rate
//! limit layer applied ahead of every route the way that adapter checks
//! IP/auth before dispatching to a handler.

use crate::auth::{auth_and_rate_limit, AuthState};
use crate::config::AgentServerConfig;
use crate::conversation_store::ConversationStore;
use crate::error::AgentError;
use crate::models::{ConversationId, ProviderRef};
use crate::orchestrator::Orchestrator;
use crate::stream_writer::sse_response;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub conversations: Arc<ConversationStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<AgentServerConfig>,
}

pub fn build_router(state: AppState, auth_state: AuthState) -> Router {
    Router::new()
        .route("/conversations", post(create_conversation))
        .route("/conversations/{id}/turns", post(send_turn))
        .layer(middleware::from_fn_with_state(auth_state, auth_and_rate_limit))
        .with_state(state)
}

#[derive(Deserialize)]
struct CreateConversationRequest {
    user_id: String,
    #[serde(default = "default_provider_name")]
    provider_name: String,
}

fn default_provider_name() -> String {
    "openai".to_string()
}

#[derive(Serialize, Deserialize)]
struct CreateConversationResponse {
    conversation_id: ConversationId,
}

async fn create_conversation(
    State(state): State<AppState>,
    Json(body): Json<CreateConversationRequest>,
) -> Response {
    let handle = state.conversations.create(
        body.user_id,
        ProviderRef { provider_name: body.provider_name, session_handle: uuid::Uuid::new_v4().to_string() },
    );
    let id = handle.lock().await.id;
    (StatusCode::CREATED, Json(CreateConversationResponse { conversation_id: id })).into_response()
}

#[derive(Deserialize)]
struct SendTurnRequest {
    user_id: String,
    text: String,
}

async fn send_turn(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Json(body): Json<SendTurnRequest>,
) -> Response {
    let result = state
        .orchestrator
        .clone()
        .run_turn(conversation_id, body.user_id, body.text)
        .await;

    match result {
        Ok(rx) => sse_response(rx, state.config.heartbeat_interval_ms).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: AgentError) -> Response {
    let status = match err {
        AgentError::Input(_) => StatusCode::BAD_REQUEST,
        AgentError::Auth(_) => StatusCode::UNAUTHORIZED,
        AgentError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        AgentError::UpstreamTransient(_) => StatusCode::BAD_GATEWAY,
        AgentError::UpstreamPermanent(_) => StatusCode::BAD_GATEWAY,
        AgentError::ProviderStream(_) => StatusCode::BAD_GATEWAY,
        AgentError::Budget { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AgentError::Cancelled => StatusCode::REQUEST_TIMEOUT,
    };
    (status, Json(serde_json::json!({"message": err.to_string(), "reason": err.reason()}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ToolResultCache;
    use crate::provider::{CompletionResult, LlmProvider, Message};
    use crate::tool_registry::ToolRegistry;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(&self, _messages: &[Message], _tools: &[crate::models::ToolDescriptor]) -> Result<CompletionResult, AgentError> {
            Ok(CompletionResult { message: Message::assistant("ok", Vec::new()), usage: None })
        }
        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn test_app() -> Router {
        let config = Arc::new(AgentServerConfig { bearer_token: "test-token".to_string(), ..AgentServerConfig::default() });
        let conversations = ConversationStore::new(24);
        let orchestrator = Arc::new(Orchestrator {
            conversations: conversations.clone(),
            tools: Arc::new(ToolRegistry::build(&config)),
            raw_data_client: Arc::new(crate::tools::tests_support::StubClient::default()),
            cache: ToolResultCache::new(600),
            config: config.clone(),
            provider: Arc::new(EchoProvider),
        });
        let auth_state = AuthState { config: config.clone(), rate_limiter: crate::auth::RateLimiter::new(60, 10) };
        build_router(AppState { conversations, orchestrator, config }, auth_state)
    }

    #[tokio::test]
    async fn create_conversation_requires_auth() {
        let app = test_app();
        let req = Request::builder()
            .method("POST")
            .uri("/conversations")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&serde_json::json!({"user_id": "u1"})).unwrap()))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_conversation_with_valid_bearer_succeeds() {
        let app = test_app();
        let req = Request::builder()
            .method("POST")
            .uri("/conversations")
            .header("content-type", "application/json")
            .header("authorization", "Bearer test-token")
            .body(Body::from(serde_json::to_vec(&serde_json::json!({"user_id": "u1"})).unwrap()))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: CreateConversationResponse = serde_json::from_slice(&bytes).unwrap();
        assert_ne!(body.conversation_id, uuid::Uuid::nil());
    }
}
