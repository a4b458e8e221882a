//! Prompt Library (SPEC_FULL.md §4): four system-prompt modes layered on
//! shared guardrails, selectable at conversation creation and switchable
//! mid-conversation via an in-text `/mode <color>` command.
//!
//! Grounded on `src/cloudllm/llm_session.rs::LLMSession::set_system_prompt`
//! treating the system prompt as a first-class, replaceable `Message`
//! rather than a constant baked into the conversation history. Templating
//! is plain `format!` substitution, matching this codebase's avoidance of
//! incidental dependencies — nothing here calls for a templating engine.

use crate::models::Mode;

/// Guardrails shared by every mode: what the agent must never do,
/// regardless of which persona is active.
const SHARED_GUARDRAILS: &str = "\
You answer portfolio analytics questions using only the data returned by \
your tools. Never fabricate a price, position, or metric. If a tool \
reports a data-quality issue, disclose it in your answer rather than \
silently working around it. You are not a financial advisor; do not give \
investment recommendations.";

/// One entry in the prompt library: a stable id, a semver so downstream
/// logs can pin exactly which prompt text produced a given answer, a
/// rough token-budget hint for truncation heuristics upstream, and the
/// mode-specific persona text layered on top of the shared guardrails.
pub struct PromptSpec {
    pub prompt_id: &'static str,
    pub version: &'static str,
    pub token_budget_hint: usize,
    persona: &'static str,
}

impl PromptSpec {
    /// Renders the full system prompt: persona followed by the shared
    /// guardrails, so mode-specific instructions read first but can never
    /// override the guardrails that follow.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.persona, SHARED_GUARDRAILS)
    }
}

const GREEN: PromptSpec = PromptSpec {
    prompt_id: "green",
    version: "1.0.0",
    token_budget_hint: 400,
    persona: "You are a plain-language portfolio analyst. Explain numbers \
in terms a non-specialist investor would understand; avoid jargon unless \
you immediately define it.",
};

const BLUE: PromptSpec = PromptSpec {
    prompt_id: "blue",
    version: "1.0.0",
    token_budget_hint: 600,
    persona: "You are a quantitative portfolio analyst. Lead with the \
numbers: weights, returns, factor exposures, data-quality caveats. Favor \
tables over prose when presenting more than three figures.",
};

const INDIGO: PromptSpec = PromptSpec {
    prompt_id: "indigo",
    version: "1.0.0",
    token_budget_hint: 500,
    persona: "You are a risk-focused portfolio analyst. For every question, \
surface the concentration, data-quality, or factor-exposure risk implied \
by the answer, even if the user did not ask about risk directly.",
};

const VIOLET: PromptSpec = PromptSpec {
    prompt_id: "violet",
    version: "1.0.0",
    token_budget_hint: 350,
    persona: "You are a terse portfolio analyst. Answer in at most three \
sentences. Expand only if the user explicitly asks for more detail.",
};

/// Resolves a [`Mode`] to its [`PromptSpec`].
pub fn spec_for(mode: Mode) -> &'static PromptSpec {
    match mode {
        Mode::Green => &GREEN,
        Mode::Blue => &BLUE,
        Mode::Indigo => &INDIGO,
        Mode::Violet => &VIOLET,
    }
}

/// Detects a leading `/mode <color>` command in a turn's raw user text.
///
/// Returns `Some(mode)` only when the text is *exactly* a mode-switch
/// command (optionally surrounded by whitespace) — a sentence that merely
/// mentions "/mode blue" mid-paragraph is left for the model to interpret
/// as ordinary text, matching the narrow-trigger behavior described in
/// SPEC_FULL.md §4.
pub fn detect_mode_switch(user_text: &str) -> Option<Mode> {
    let trimmed = user_text.trim();
    let rest = trimmed.strip_prefix("/mode")?;
    Mode::parse(rest.trim())
}
