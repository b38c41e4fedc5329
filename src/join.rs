//! Joins a chunk stream into a single buffered response (spec §4.10).

use std::collections::BTreeMap;

use crate::context::{ContentPart, Context, Message, ToolCall, ToolCallFunction};
use crate::error::LlmError;
use crate::stream::StreamResponse;
use crate::wire::{Chunk, Usage};

/// Accumulates one tool call's id/name/arguments across its deltas, keyed by
/// the wire's `index` (spec §8 invariant 4: "arguments concatenate in
/// arrival order").
#[derive(Default)]
struct ToolCallAccumulator {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// The result of folding a stream to completion: accumulated text, assembled
/// tool calls, and the first usage observed (spec §3 "Buffered response").
#[derive(Debug, Clone, Default)]
pub struct JoinedResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

/// Drains `stream` to completion, folding its chunks into a `JoinedResponse`
/// and appending the resulting assistant message to `ctx`. A mid-stream
/// error propagates as `LlmError::ApiStream`.
pub async fn join_stream(stream: &mut StreamResponse, ctx: &mut Context) -> Result<JoinedResponse, LlmError> {
    let mut text = String::new();
    let mut tool_calls: BTreeMap<usize, ToolCallAccumulator> = BTreeMap::new();
    let mut usage = None;

    while let Some(result) = stream.next().await {
        match result? {
            Chunk::Text(delta) => text.push_str(&delta),
            Chunk::Thinking { .. } | Chunk::ThinkingStart { .. } => {}
            Chunk::ToolCallStart { index, id, name } => {
                let acc = tool_calls.entry(index).or_default();
                if !id.is_empty() {
                    acc.id = Some(id);
                }
                if !name.is_empty() {
                    acc.name = Some(name);
                }
            }
            Chunk::ToolCallDelta(delta) => {
                let acc = tool_calls.entry(delta.index).or_default();
                if let Some(id) = delta.id {
                    acc.id = Some(id);
                }
                if let Some(name) = delta.name {
                    acc.name = Some(name);
                }
                if let Some(args) = delta.arguments {
                    acc.arguments.push_str(&args);
                }
                if let Some(partial) = delta.partial_json {
                    acc.arguments.push_str(&partial);
                }
            }
            Chunk::Usage(u) => {
                if usage.is_none() {
                    usage = Some(u);
                }
            }
            Chunk::Meta(_) => {}
            Chunk::Error(e) => return Err(LlmError::ApiStream(e.message)),
            Chunk::Done => break,
        }
    }

    let resolved_calls: Vec<ToolCall> = tool_calls
        .into_iter()
        .map(|(_, acc)| ToolCall {
            id: acc.id.unwrap_or_else(ToolCall::generate_id),
            function: ToolCallFunction {
                name: acc.name.unwrap_or_default(),
                arguments: acc.arguments,
            },
        })
        .collect();

    if !text.is_empty() || !resolved_calls.is_empty() {
        let content = if text.is_empty() { Vec::new() } else { vec![ContentPart::text(text.clone())] };
        let tool_calls_field = if resolved_calls.is_empty() { None } else { Some(resolved_calls.clone()) };
        ctx.push(Message::assistant(content, tool_calls_field));
    }

    Ok(JoinedResponse { text, tool_calls: resolved_calls, usage })
}
