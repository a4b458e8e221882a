//! Agent Orchestrator (SPEC_FULL.md §6): drives one turn end-to-end —
//! mode-switch detection, the LLM call, the bounded tool-dispatch loop,
//! and conversation-history commit — emitting a [`StreamEvent`] at each
//! lifecycle step.
//!
//! The tool-dispatch loop is `src/cloudllm/agent.rs::Agent::send()`
//! generalized: same call-then-check-for-tool-calls-then-recall shape,
//! same early-return-once-the-model-stops-asking-for-tools termination
//! condition, iteration cap raised from the teacher's 5 to this crate's 8
//! (SPEC_FULL.md's resolved OQ-ROUNDS). The teacher's brace-counting
//! `parse_tool_call()` text-scraping has no counterpart here — tool calls
//! arrive as typed [`crate::provider::NativeToolCall`] values, never as
//! JSON embedded in a text completion. Event emission follows
//! `src/cloudllm/event.rs::AgentEvent`: `SendStarted`/`SendCompleted`/
//! `ToolCallDetected`/`ToolExecutionCompleted`/`ToolMaxIterationsReached`
//! map onto `start`/`done`/`tool_call`/`tool_result`/
//! `tool_loop_budget_exceeded` stream events respectively.

use crate::cache::ToolResultCache;
use crate::config::AgentServerConfig;
use crate::conversation_store::ConversationStore;
use crate::error::AgentError;
use crate::models::{ConversationId, EnvelopeMeta, Mode, StreamEvent, Turn, UserId};
use crate::prompts::{self, spec_for};
use crate::provider::{LlmProvider, Message};
use crate::raw_data_client::RawDataClient;
use crate::tool_registry::ToolRegistry;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Everything a turn needs, bundled so `run_turn` doesn't take a dozen
/// separate arguments.
pub struct Orchestrator {
    pub conversations: Arc<ConversationStore>,
    pub tools: Arc<ToolRegistry>,
    pub raw_data_client: Arc<dyn RawDataClient>,
    pub cache: Arc<ToolResultCache>,
    pub config: Arc<AgentServerConfig>,
    pub provider: Arc<dyn LlmProvider>,
}

impl Orchestrator {
    /// Runs one turn, returning a channel of [`StreamEvent`]s as soon as
    /// request validation and ownership checks pass. The caller (the SSE
    /// stream writer) drains the channel until it closes; closing happens
    /// after `Done` or after an `Error` event, whichever comes first.
    pub async fn run_turn(
        self: Arc<Self>,
        conversation_id: ConversationId,
        user_id: UserId,
        user_text: String,
    ) -> Result<mpsc::Receiver<StreamEvent>, AgentError> {
        let word_count = user_text.split_whitespace().count();
        if word_count == 0 {
            return Err(AgentError::Input("turn text must not be empty".to_string()));
        }
        if word_count > self.config.max_turn_text_len {
            return Err(AgentError::Input(format!(
                "turn text exceeds {} words",
                self.config.max_turn_text_len
            )));
        }

        // Ownership check happens before the channel is handed back, so a
        // caller probing another user's conversation id gets a synchronous
        // Auth error rather than a stream that immediately errors.
        let handle = self.conversations.get_owned(conversation_id, &user_id).await?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            self.drive_turn(handle, conversation_id, user_id, user_text, tx).await;
        });

        Ok(rx)
    }

    async fn drive_turn(
        self: Arc<Self>,
        handle: Arc<tokio::sync::Mutex<crate::models::Conversation>>,
        conversation_id: ConversationId,
        user_id: UserId,
        user_text: String,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let _ = tx.send(StreamEvent::Start {}).await;

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(self.config.turn_total_timeout_secs),
            self.run_turn_inner(&handle, conversation_id, &user_id, user_text, &tx),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                let _ = tx.send(StreamEvent::Done {}).await;
            }
            Ok(Err(err)) => {
                let _ = tx
                    .send(StreamEvent::Error { message: err.to_string(), reason: err.reason().to_string() })
                    .await;
                let _ = tx.send(StreamEvent::Done {}).await;
            }
            Err(_) => {
                let err = AgentError::UpstreamTransient("turn exceeded total timeout".to_string());
                let _ = tx
                    .send(StreamEvent::Error { message: err.to_string(), reason: err.reason().to_string() })
                    .await;
                let _ = tx.send(StreamEvent::Done {}).await;
            }
        }
    }

    async fn run_turn_inner(
        &self,
        handle: &Arc<tokio::sync::Mutex<crate::models::Conversation>>,
        conversation_id: ConversationId,
        user_id: &str,
        user_text: String,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<(), AgentError> {
        let started_at = Utc::now();

        // A bare `/mode <color>` command never reaches the model: it's
        // consumed entirely by the orchestrator and acknowledged with a
        // `mode_changed` event.
        if let Some(new_mode) = prompts::detect_mode_switch(&user_text) {
            let mut conv = handle.lock().await;
            conv.mode = new_mode;
            conv.last_active_at = Utc::now();
            let turn = Turn {
                user_text: user_text.clone().into(),
                assistant_text: format!("Switched to {} mode.", new_mode.as_str()).into(),
                mode: new_mode,
                created_at: started_at,
                tool_invocations: Vec::new(),
            };
            conv.turns.push(turn);
            drop(conv);
            let _ = tx.send(StreamEvent::ModeChanged { mode: new_mode }).await;
            return Ok(());
        }

        let (mode, mut messages) = {
            let conv = handle.lock().await;
            let mode = conv.mode;
            let mut messages = vec![Message::system(spec_for(mode).render())];
            for turn in &conv.turns {
                messages.push(Message::user(turn.user_text.clone()));
                messages.push(Message::assistant(turn.assistant_text.clone(), Vec::new()));
            }
            (mode, messages)
        };
        messages.push(Message::user(user_text.clone()));

        let mut tool_invocations = Vec::new();
        let mut rounds = 0usize;
        let final_text;

        loop {
            if rounds >= self.config.tool_loop_max_rounds {
                handle.lock().await.last_active_at = Utc::now();
                return Err(AgentError::Budget { rounds });
            }

            // A retryable provider-stream failure (e.g. a transient upstream
            // hiccup) gets one retry against the same conversation before
            // the turn gives up.
            let completion = match self.provider.complete(&messages, self.tools.descriptors()).await {
                Ok(completion) => completion,
                Err(err) if err.retryable() => self.provider.complete(&messages, self.tools.descriptors()).await?,
                Err(err) => return Err(err),
            };

            if completion.message.tool_calls.is_empty() {
                final_text = completion.message.content.to_string();
                break;
            }

            for call in &completion.message.tool_calls {
                let _ = tx
                    .send(StreamEvent::ToolCall { name: call.name.clone(), args: call.arguments.clone() })
                    .await;

                let ctx = crate::models::ToolContext {
                    conversation_id,
                    user_id: user_id.to_string(),
                    request_id: Uuid::new_v4(),
                    as_of: Utc::now(),
                };

                let result = self
                    .tools
                    .execute(
                        &call.name,
                        call.arguments.clone(),
                        ctx,
                        self.raw_data_client.clone(),
                        self.cache.clone(),
                        self.config.clone(),
                    )
                    .await;

                let (preview, meta) = match &result.envelope {
                    Some(envelope) => (Some(envelope.data.to_string()), Some(envelope.meta.clone())),
                    None => (None, None::<EnvelopeMeta>),
                };
                let _ = tx
                    .send(StreamEvent::ToolResult { name: call.name.clone(), meta, preview })
                    .await;

                let tool_reply_text = match &result.envelope {
                    Some(envelope) => envelope.data.to_string(),
                    None => serde_json::to_string(&result.error).unwrap_or_default(),
                };
                messages.push(Message::tool_result(call.id.clone(), tool_reply_text));

                tool_invocations.push(crate::models::ToolInvocation {
                    tool_name: call.name.clone(),
                    args: call.arguments.clone(),
                    result,
                    started_at: Utc::now(),
                    finished_at: Utc::now(),
                });
            }

            messages.push(Message::assistant(completion.message.content.clone(), Vec::new()));
            rounds += 1;
        }

        let mut conv = handle.lock().await;
        conv.last_active_at = Utc::now();
        conv.turns.push(Turn {
            user_text: user_text.into(),
            assistant_text: final_text.clone().into(),
            mode,
            created_at: started_at,
            tool_invocations,
        });
        drop(conv);

        for chunk in final_text.split_inclusive(' ') {
            let _ = tx.send(StreamEvent::Delta { delta: chunk.to_string() }).await;
        }

        Ok(())
    }
}
