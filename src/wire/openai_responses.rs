//! OpenAI Responses wire protocol (spec §4.9).

use serde_json::{json, Map, Value};

use super::{Chunk, ChunkError, FinishReason, Meta, SseEvent, ToolCallDelta, Usage, WireProtocol};
use crate::catalog::ModelDescriptor;
use crate::context::{Context, Role};
use crate::error::LlmError;
use crate::options::{CompletionOptions, ReasoningEffort};

pub struct OpenAiResponses;

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "developer",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn effort_str(effort: ReasoningEffort) -> &'static str {
    match effort {
        ReasoningEffort::Low => "low",
        ReasoningEffort::Medium => "medium",
        ReasoningEffort::High => "high",
    }
}

impl WireProtocol for OpenAiResponses {
    fn endpoint(&self, _model: &ModelDescriptor) -> String {
        "/v1/responses".to_string()
    }

    fn encode_body(&self, model: &ModelDescriptor, ctx: &Context, opts: &CompletionOptions) -> Result<Value, LlmError> {
        let input: Vec<Value> = ctx
            .messages
            .iter()
            .map(|m| {
                let part_type = if m.role == Role::Assistant { "output_text" } else { "input_text" };
                json!({
                    "role": role_str(m.role),
                    "content": [{"type": part_type, "text": m.text()}],
                })
            })
            .collect();

        let mut body = Map::new();
        body.insert("model".to_string(), json!(model.id));
        body.insert("input".to_string(), json!(input));
        body.insert("stream".to_string(), json!(true));

        if let Some(v) = opts.max_completion_tokens {
            body.insert("max_output_tokens".to_string(), json!(v));
        }
        if let Some(effort) = opts.reasoning_effort {
            body.insert("reasoning".to_string(), json!({"effort": effort_str(effort)}));
        }

        Ok(Value::Object(body))
    }

    fn decode(&self, event: &SseEvent, _model: &ModelDescriptor) -> Vec<Chunk> {
        let data = event.data.trim();
        if data == "[DONE]" {
            return vec![Chunk::Done];
        }
        let parsed: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(_) => return vec![],
        };
        let event_type = parsed.get("type").and_then(|v| v.as_str()).unwrap_or("");

        match event_type {
            "response.output_text.delta" => {
                let text = parsed.get("delta").and_then(|v| v.as_str()).unwrap_or("");
                vec![Chunk::Text(text.to_string())]
            }
            "response.reasoning.delta" => {
                let text = parsed.get("delta").and_then(|v| v.as_str()).unwrap_or("");
                vec![Chunk::Thinking { text: text.to_string() }]
            }
            "response.usage" | "response.completed" => {
                let mut chunks = Vec::new();
                if let Some(usage) = parsed.get("response").and_then(|r| r.get("usage")).or_else(|| parsed.get("usage")) {
                    chunks.push(Chunk::Usage(Usage {
                        input: usage.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                        output: usage.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                        total: usage.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                        reasoning: usage
                            .get("output_tokens_details")
                            .and_then(|d| d.get("reasoning_tokens"))
                            .and_then(|v| v.as_u64())
                            .map(|v| v as u32),
                        cache_read: None,
                        cache_creation: None,
                    }));
                }
                if event_type == "response.completed" {
                    chunks.push(Chunk::Meta(Meta {
                        terminal: true,
                        finish_reason: Some(FinishReason::Stop),
                        response_id: parsed.get("response").and_then(|r| r.get("id")).and_then(|v| v.as_str()).map(String::from),
                    }));
                }
                chunks
            }
            "response.incomplete" => vec![Chunk::Meta(Meta {
                terminal: true,
                finish_reason: Some(FinishReason::Length),
                response_id: parsed.get("response").and_then(|r| r.get("id")).and_then(|v| v.as_str()).map(String::from),
            })],
            "response.output_item.added" => {
                let item = parsed.get("item");
                if item.and_then(|i| i.get("type")).and_then(|v| v.as_str()) == Some("function_call") {
                    let index = parsed.get("output_index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
                    let id = item.and_then(|i| i.get("call_id")).and_then(|v| v.as_str()).unwrap_or("").to_string();
                    let name = item.and_then(|i| i.get("name")).and_then(|v| v.as_str()).unwrap_or("").to_string();
                    vec![Chunk::ToolCallStart { index, id, name }]
                } else {
                    vec![]
                }
            }
            "response.function_call_arguments.delta" => {
                let index = parsed.get("output_index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
                let delta = parsed.get("delta").and_then(|v| v.as_str()).unwrap_or("");
                vec![Chunk::ToolCallDelta(ToolCallDelta {
                    index,
                    arguments: Some(delta.to_string()),
                    ..Default::default()
                })]
            }
            "error" => {
                let message = parsed.get("message").and_then(|v| v.as_str()).unwrap_or("unknown error").to_string();
                vec![Chunk::Error(ChunkError { message, error_type: Some("api_error".into()), code: None })]
            }
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CATALOG;
    use crate::context::Message;

    fn model() -> ModelDescriptor {
        CATALOG.lookup("openai", "o1").unwrap()
    }

    #[test]
    fn encode_body_maps_system_to_developer_role() {
        let ctx = Context::new(vec![Message::system("be terse"), Message::user("hi")]);
        let body = OpenAiResponses.encode_body(&model(), &ctx, &CompletionOptions::new()).unwrap();
        assert_eq!(body["input"][0]["role"], "developer");
    }

    #[test]
    fn decode_output_text_delta() {
        let event = SseEvent {
            data: r#"{"type":"response.output_text.delta","delta":"Hi"}"#.into(),
            ..Default::default()
        };
        match &OpenAiResponses.decode(&event, &model())[0] {
            Chunk::Text(t) => assert_eq!(t, "Hi"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn decode_done_marker() {
        let event = SseEvent { data: "[DONE]".into(), ..Default::default() };
        assert!(matches!(OpenAiResponses.decode(&event, &model())[0], Chunk::Done));
    }

    #[test]
    fn decode_function_call_added_then_args_delta() {
        let added = SseEvent {
            data: r#"{"type":"response.output_item.added","output_index":0,"item":{"type":"function_call","call_id":"call_1","name":"lookup"}}"#.into(),
            ..Default::default()
        };
        match &OpenAiResponses.decode(&added, &model())[0] {
            Chunk::ToolCallStart { id, name, .. } => {
                assert_eq!(id, "call_1");
                assert_eq!(name, "lookup");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
