//! Wire protocols: per-API-family request encoding and SSE event decoding
//! (spec §4.9).

pub mod anthropic_messages;
pub mod openai_chat;
pub mod openai_embeddings;
pub mod openai_responses;

use serde_json::Value;

use crate::catalog::ModelDescriptor;
use crate::context::Context;
use crate::error::LlmError;
use crate::options::CompletionOptions;

/// One complete SSE event, as parsed by the stream state machine's framer
/// (spec §4.6: "each terminated by a blank line").
#[derive(Debug, Clone, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Usage accounting, normalized across wire families.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Usage {
    pub input: u32,
    pub output: u32,
    pub total: u32,
    pub reasoning: Option<u32>,
    pub cache_read: Option<u32>,
    pub cache_creation: Option<u32>,
}

/// The reason a model stopped generating (spec §3 "Buffered response").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

/// A tool-call-delta payload, as incrementally decoded off the wire.
#[derive(Debug, Clone, Default)]
pub struct ToolCallDelta {
    pub index: usize,
    pub id: Option<String>,
    pub call_type: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
    pub partial_json: Option<String>,
}

/// Metadata attached to a terminal or near-terminal event.
#[derive(Debug, Clone, Default)]
pub struct Meta {
    pub terminal: bool,
    pub finish_reason: Option<FinishReason>,
    pub response_id: Option<String>,
}

/// A decode-time or mid-stream error surfaced as a chunk (spec §4.6).
#[derive(Debug, Clone)]
pub struct ChunkError {
    pub message: String,
    pub error_type: Option<String>,
    pub code: Option<String>,
}

/// The uniform set of chunk variants every wire decoder emits (spec §4.6).
#[derive(Debug, Clone)]
pub enum Chunk {
    Text(String),
    Thinking { text: String },
    ThinkingStart { meta: Option<Value> },
    ToolCallStart { index: usize, id: String, name: String },
    ToolCallDelta(ToolCallDelta),
    Usage(Usage),
    Meta(Meta),
    Error(ChunkError),
    /// Terminator sentinel (spec §4.6: "nil (terminator sentinel; optional)").
    Done,
}

/// The per-API-family capability set (spec §4.9).
pub trait WireProtocol: Send + Sync {
    /// Request path appended to the provider's base URL.
    fn endpoint(&self, model: &ModelDescriptor) -> String;

    /// Builds the JSON request body.
    fn encode_body(&self, model: &ModelDescriptor, ctx: &Context, opts: &CompletionOptions) -> Result<Value, LlmError>;

    /// Decodes one SSE event into zero or more chunks.
    fn decode(&self, event: &SseEvent, model: &ModelDescriptor) -> Vec<Chunk>;

    /// Extra headers beyond the provider's base auth headers.
    fn headers(&self, _opts: &CompletionOptions) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Projects a non-streaming embeddings response into output vectors.
    /// Only implemented by embedding wire protocols.
    fn extract_embeddings(&self, _response: &Value, _input_len: usize) -> Result<Vec<Vec<f32>>, LlmError> {
        Err(LlmError::Unknown("wire protocol does not support embeddings".into()))
    }
}

/// Resolves the wire protocol implementation for a model (spec §4.1 stage 5).
pub fn resolve_wire(model: &ModelDescriptor) -> Box<dyn WireProtocol> {
    match model.wire_protocol() {
        Some("anthropic_messages") => Box::new(anthropic_messages::AnthropicMessages),
        Some("openai_responses") => Box::new(openai_responses::OpenAiResponses),
        Some("openai_embeddings") => Box::new(openai_embeddings::OpenAiEmbeddings),
        Some("openai_chat") => Box::new(openai_chat::OpenAiChat),
        _ => match model.provider.as_str() {
            "anthropic" => Box::new(anthropic_messages::AnthropicMessages),
            _ => Box::new(openai_chat::OpenAiChat),
        },
    }
}
