//! Structured option bag (spec §9 design note: "rearchitect the open-ended
//! keyword list as a structured options value with an enumerated set of
//! recognized fields").

use serde::{Deserialize, Serialize};

use crate::schema::CompiledSchema;
use crate::tools::Tool;

/// The operation a request is performing; drives validation (spec §4.4) and
/// wire encoding (`response_format` for `Object`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Text,
    Object,
    Embed,
}

/// Temperature handling mode requested by `thinking`, mirrored from
/// `model.extra.constraints.temperature` once resolved (kept here only as a
/// caller-settable raw value; the constraints engine is what interprets it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<ReasoningEffort>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

/// A normalized tool_choice value, pass-through to the wire layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Tool { name: String },
}

/// The structured option bag threaded through the pipeline. Every field the
/// pipeline can read or write is named explicitly; there is no open-ended
/// extension point (spec §9).
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub max_completion_tokens: Option<u32>,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub thinking: Option<ThinkingOptions>,
    pub tools: Option<Vec<Tool>>,
    pub tool_choice: Option<ToolChoice>,
    pub operation: Option<Operation>,
    pub compiled_schema: Option<CompiledSchema>,
    pub stream: bool,
    pub anthropic_prompt_cache: bool,
    pub anthropic_prompt_cache_ttl: Option<String>,
    pub receive_timeout_secs: Option<u64>,
    pub fixture: Option<String>,
    pub system_prompt: Option<String>,
    /// Diagnostic trail of adapters that matched and transformed this bag
    /// (spec §4.5: "an adapter may stamp `opts._adapter_applied`").
    pub adapter_applied: Vec<String>,
}

impl CompletionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixture(mut self, name: impl Into<String>) -> Self {
        self.fixture = Some(name.into());
        self
    }

    pub fn with_max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// The receive timeout to apply, in seconds, honoring adapter overrides
    /// and falling back to the spec §5 default of 30s.
    pub fn receive_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.receive_timeout_secs.unwrap_or(30))
    }

    pub fn mark_adapter_applied(&mut self, name: &str) {
        self.adapter_applied.push(name.to_string());
    }
}
