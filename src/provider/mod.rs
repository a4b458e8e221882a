//! Provider adapter (SPEC_FULL.md §6): the seam between this crate's typed
//! conversation/tool model and whatever LLM vendor API a deployment is
//! wired to.
//!
//! A narrowed, single-purpose descendant of
//! `src/cloudllm/client_wrapper.rs::ClientWrapper` — that trait's
//! `send_message`/`send_message_stream` pair and its `Message`/`Role`/
//! `ToolDefinition`/`NativeToolCall`/`TokenUsage` types are reused nearly
//! verbatim. What's dropped is the teacher's brace-counting
//! `parse_tool_call()` text-extraction path: this crate assumes the
//! provider supports native function-calling, so a tool call always
//! arrives as a typed `NativeToolCall`, never as embedded JSON inside a
//! text completion that has to be parsed back out.

use crate::error::AgentError;
use crate::models::ToolDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A role-tagged message in a provider conversation. `Tool` carries the
/// `call_id` it is answering, same shape as `client_wrapper::Role::Tool`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool { call_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Arc<str>,
    #[serde(default)]
    pub tool_calls: Vec<NativeToolCall>,
}

impl Message {
    pub fn system(content: impl Into<Arc<str>>) -> Self {
        Self { role: Role::System, content: content.into(), tool_calls: Vec::new() }
    }

    pub fn user(content: impl Into<Arc<str>>) -> Self {
        Self { role: Role::User, content: content.into(), tool_calls: Vec::new() }
    }

    pub fn assistant(content: impl Into<Arc<str>>, tool_calls: Vec<NativeToolCall>) -> Self {
        Self { role: Role::Assistant, content: content.into(), tool_calls }
    }

    pub fn tool_result(call_id: String, content: impl Into<Arc<str>>) -> Self {
        Self { role: Role::Tool { call_id }, content: content.into(), tool_calls: Vec::new() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A completed (non-streaming) provider response: the assistant's message
/// plus whatever usage accounting the provider reported.
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub message: Message,
    pub usage: Option<TokenUsage>,
}

/// One incremental chunk of a streamed provider response.
#[derive(Debug, Clone)]
pub struct MessageChunk {
    pub delta: String,
    pub tool_calls: Vec<NativeToolCall>,
    pub finish_reason: Option<String>,
}

fn to_tool_definitions(descriptors: &[ToolDescriptor]) -> Vec<serde_json::Value> {
    descriptors
        .iter()
        .map(|d| {
            serde_json::json!({
                "name": d.name,
                "description": d.description,
                "parameters": d.json_schema,
            })
        })
        .collect()
}

/// Provider-agnostic seam the orchestrator calls through.
///
/// Implementations own retry/fallback-model behavior internally (the
/// `model_fallback_id` config field is consumed by the implementation,
/// not by the orchestrator) so the turn loop in `crate::orchestrator`
/// never needs to know which vendor it's talking to.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends the full message history plus the tool schema and returns
    /// the assistant's completed response.
    async fn complete(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Result<CompletionResult, AgentError>;

    /// Streaming counterpart of [`LlmProvider::complete`]. Default
    /// implementation reports no native streaming support, matching
    /// `ClientWrapper::send_message_stream`'s `Ok(None)` default so
    /// callers can fall back to a single non-streamed completion chunked
    /// for display.
    async fn complete_stream(
        &self,
        _messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<Option<futures_util::stream::BoxStream<'static, Result<MessageChunk, AgentError>>>, AgentError> {
        Ok(None)
    }

    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definitions_carry_name_and_schema() {
        let descriptors = vec![ToolDescriptor::new("prices-quotes", "desc", serde_json::json!({"type": "object"}))];
        let defs = to_tool_definitions(&descriptors);
        assert_eq!(defs[0]["name"], "prices-quotes");
    }

    #[test]
    fn tool_result_message_carries_call_id() {
        let msg = Message::tool_result("call-1".to_string(), "{}");
        match msg.role {
            Role::Tool { call_id } => assert_eq!(call_id, "call-1"),
            _ => panic!("expected Role::Tool"),
        }
    }
}
