//! Anthropic Messages wire protocol (spec §4.9), grounded in the tagged
//! content-block/delta event shapes used by Anthropic's streaming API.

use serde_json::{json, Map, Value};

use super::{Chunk, ChunkError, Meta, SseEvent, ToolCallDelta, Usage, WireProtocol};
use crate::catalog::ModelDescriptor;
use crate::context::{ContentPart, Context, Message, Role};
use crate::error::LlmError;
use crate::options::{CompletionOptions, ToolChoice};

pub struct AnthropicMessages;

fn content_part_to_json(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({"type": "text", "text": text}),
        ContentPart::Thinking { text } => json!({"type": "thinking", "thinking": text}),
        ContentPart::ImageUrl { url } => json!({"type": "image", "source": {"type": "url", "url": url}}),
        ContentPart::Image { data, media_type } => {
            use base64::{engine::general_purpose::STANDARD, Engine as _};
            json!({
                "type": "image",
                "source": {"type": "base64", "media_type": media_type, "data": STANDARD.encode(data)},
            })
        }
        ContentPart::File { filename, .. } => json!({"type": "text", "text": format!("[file: {}]", filename)}),
    }
}

fn assistant_message_to_json(message: &Message) -> Value {
    let mut blocks: Vec<Value> = message.content.iter().map(content_part_to_json).collect();
    if let Some(tool_calls) = &message.tool_calls {
        for tc in tool_calls {
            let input: Value = serde_json::from_str(&tc.function.arguments).unwrap_or(Value::Null);
            blocks.push(json!({"type": "tool_use", "id": tc.id, "name": tc.function.name, "input": input}));
        }
    }
    json!({"role": "assistant", "content": blocks})
}

fn tool_message_to_json(message: &Message) -> Value {
    json!({
        "role": "user",
        "content": [{
            "type": "tool_result",
            "tool_use_id": message.tool_call_id,
            "content": message.text(),
        }],
    })
}

fn user_message_to_json(message: &Message) -> Value {
    json!({"role": "user", "content": message.content.iter().map(content_part_to_json).collect::<Vec<_>>()})
}

/// Splits `system` out to a top-level field; returns (system_value, rest).
fn split_system(ctx: &Context, cache: bool, ttl: Option<&str>) -> (Option<Value>, Vec<&Message>) {
    let system_text: Option<String> = ctx.system_message().map(Message::text);
    let rest: Vec<&Message> = ctx.messages.iter().filter(|m| m.role != Role::System).collect();

    let system_value = system_text.map(|text| {
        if cache {
            let mut block = Map::new();
            block.insert("type".to_string(), json!("text"));
            block.insert("text".to_string(), json!(text));
            let mut cache_control = Map::new();
            cache_control.insert("type".to_string(), json!("ephemeral"));
            if let Some(ttl) = ttl {
                cache_control.insert("ttl".to_string(), json!(ttl));
            }
            block.insert("cache_control".to_string(), Value::Object(cache_control));
            json!([Value::Object(block)])
        } else {
            json!(text)
        }
    });
    (system_value, rest)
}

fn tool_choice_to_json(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({"type": "auto"}),
        ToolChoice::None => json!({"type": "none"}),
        ToolChoice::Required => json!({"type": "any"}),
        ToolChoice::Tool { name } => json!({"type": "tool", "name": name}),
    }
}

impl WireProtocol for AnthropicMessages {
    fn endpoint(&self, _model: &ModelDescriptor) -> String {
        "/v1/messages".to_string()
    }

    fn headers(&self, opts: &CompletionOptions) -> Vec<(String, String)> {
        let mut headers = vec![("anthropic-version".to_string(), "2023-06-01".to_string())];
        let mut betas = Vec::new();
        if opts.thinking.is_some() || opts.reasoning_effort.is_some() {
            betas.push("interleaved-thinking-2025-05-14");
        }
        if opts.anthropic_prompt_cache {
            betas.push("prompt-caching-2024-07-31");
        }
        if !betas.is_empty() {
            headers.push(("anthropic-beta".to_string(), betas.join(",")));
        }
        headers
    }

    fn encode_body(&self, model: &ModelDescriptor, ctx: &Context, opts: &CompletionOptions) -> Result<Value, LlmError> {
        let (system, rest) = split_system(ctx, opts.anthropic_prompt_cache, opts.anthropic_prompt_cache_ttl.as_deref());

        let messages: Vec<Value> = rest
            .iter()
            .map(|m| match m.role {
                Role::Assistant => assistant_message_to_json(m),
                Role::Tool => tool_message_to_json(m),
                _ => user_message_to_json(m),
            })
            .collect();

        let mut body = Map::new();
        body.insert("model".to_string(), json!(model.id));
        body.insert("messages".to_string(), json!(messages));
        body.insert("stream".to_string(), json!(true));
        body.insert("max_tokens".to_string(), json!(opts.max_tokens.unwrap_or(1024)));
        if let Some(system) = system {
            body.insert("system".to_string(), system);
        }

        let thinking_enabled = opts.thinking.is_some() || opts.reasoning_effort.is_some();
        if thinking_enabled {
            let budget = opts
                .thinking
                .as_ref()
                .and_then(|t| t.budget_tokens)
                .unwrap_or(2048);
            body.insert("thinking".to_string(), json!({"type": "enabled", "budget_tokens": budget}));
        } else if let Some(temp) = opts.temperature {
            body.insert("temperature".to_string(), json!(temp));
        }

        if let Some(tools) = &opts.tools {
            body.insert(
                "tools".to_string(),
                json!(tools.iter().map(|t| t.to_schema("anthropic")).collect::<Vec<_>>()),
            );
        }
        if let Some(choice) = &opts.tool_choice {
            body.insert("tool_choice".to_string(), tool_choice_to_json(choice));
        }

        Ok(Value::Object(body))
    }

    fn decode(&self, event: &SseEvent, _model: &ModelDescriptor) -> Vec<Chunk> {
        let data = event.data.trim();
        if data.is_empty() {
            return vec![];
        }
        let parsed: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                return vec![Chunk::Error(ChunkError {
                    message: format!("decode error: {}", e),
                    error_type: Some("decode_error".to_string()),
                    code: None,
                })]
            }
        };

        let event_type = parsed.get("type").and_then(|v| v.as_str()).unwrap_or("");
        match event_type {
            "message_stop" => vec![Chunk::Done],
            "message_delta" => {
                if let Some(usage) = parsed.get("usage") {
                    vec![Chunk::Usage(Usage {
                        input: usage.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                        output: usage.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                        total: usage.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32
                            + usage.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                        reasoning: None,
                        cache_read: usage.get("cache_read_input_tokens").and_then(|v| v.as_u64()).map(|v| v as u32),
                        cache_creation: usage.get("cache_creation_input_tokens").and_then(|v| v.as_u64()).map(|v| v as u32),
                    })]
                } else {
                    vec![]
                }
            }
            "content_block_delta" => {
                let delta = parsed.get("delta");
                let delta_type = delta.and_then(|d| d.get("type")).and_then(|v| v.as_str()).unwrap_or("");
                let index = parsed.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
                match delta_type {
                    "text_delta" => {
                        let text = delta.and_then(|d| d.get("text")).and_then(|v| v.as_str()).unwrap_or("");
                        vec![Chunk::Text(text.to_string())]
                    }
                    "thinking_delta" => {
                        let text = delta
                            .and_then(|d| d.get("thinking").or_else(|| d.get("text")))
                            .and_then(|v| v.as_str())
                            .unwrap_or("");
                        vec![Chunk::Thinking { text: text.to_string() }]
                    }
                    "input_json_delta" => {
                        let partial = delta.and_then(|d| d.get("partial_json")).and_then(|v| v.as_str()).unwrap_or("");
                        vec![Chunk::ToolCallDelta(ToolCallDelta {
                            index,
                            partial_json: Some(partial.to_string()),
                            ..Default::default()
                        })]
                    }
                    _ => vec![],
                }
            }
            "content_block_start" => {
                let block = parsed.get("content_block");
                let block_type = block.and_then(|b| b.get("type")).and_then(|v| v.as_str()).unwrap_or("");
                let index = parsed.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
                match block_type {
                    "tool_use" => {
                        let id = block.and_then(|b| b.get("id")).and_then(|v| v.as_str()).unwrap_or("").to_string();
                        let name = block.and_then(|b| b.get("name")).and_then(|v| v.as_str()).unwrap_or("").to_string();
                        vec![Chunk::ToolCallStart { index, id, name }]
                    }
                    "thinking" => {
                        let mut out = vec![Chunk::ThinkingStart { meta: None }];
                        if let Some(text) = block.and_then(|b| b.get("thinking")).and_then(|v| v.as_str()) {
                            if !text.is_empty() {
                                out.push(Chunk::Thinking { text: text.to_string() });
                            }
                        }
                        out
                    }
                    _ => vec![],
                }
            }
            "message_stop_error" | "error" => {
                let message = parsed
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error")
                    .to_string();
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
        CATALOG.lookup("anthropic", "claude-3-5-sonnet-20241022").unwrap()
    }

    #[test]
    fn encode_body_splits_system_to_top_level() {
        let ctx = Context::new(vec![Message::system("be terse"), Message::user("hi")]);
        let body = AnthropicMessages.encode_body(&model(), &ctx, &CompletionOptions::new()).unwrap();
        assert_eq!(body["system"], "be terse");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn default_max_tokens_is_1024() {
        let ctx = Context::new(vec![Message::user("hi")]);
        let body = AnthropicMessages.encode_body(&model(), &ctx, &CompletionOptions::new()).unwrap();
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn decode_text_delta() {
        let event = SseEvent {
            data: r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#.into(),
            ..Default::default()
        };
        let chunks = AnthropicMessages.decode(&event, &model());
        match &chunks[0] {
            Chunk::Text(t) => assert_eq!(t, "hi"),
            other => panic!("unexpected chunk {:?}", other),
        }
    }

    #[test]
    fn decode_tool_use_start() {
        let event = SseEvent {
            data: r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"lookup"}}"#.into(),
            ..Default::default()
        };
        let chunks = AnthropicMessages.decode(&event, &model());
        match &chunks[0] {
            Chunk::ToolCallStart { index, id, name } => {
                assert_eq!(*index, 1);
                assert_eq!(id, "toolu_1");
                assert_eq!(name, "lookup");
            }
            other => panic!("unexpected chunk {:?}", other),
        }
    }

    #[test]
    fn decode_message_stop_yields_done() {
        let event = SseEvent { data: r#"{"type":"message_stop"}"#.into(), ..Default::default() };
        assert!(matches!(AnthropicMessages.decode(&event, &model())[0], Chunk::Done));
    }

    #[test]
    fn decode_invalid_json_yields_error_chunk() {
        let event = SseEvent { data: "{not json".into(), ..Default::default() };
        match &AnthropicMessages.decode(&event, &model())[0] {
            Chunk::Error(e) => assert_eq!(e.error_type.as_deref(), Some("decode_error")),
            other => panic!("unexpected chunk {:?}", other),
        }
    }
}
