//! OpenAI Chat Completions wire protocol (spec §4.9).

use serde_json::{json, Map, Value};

use super::{Chunk, ChunkError, FinishReason, Meta, SseEvent, ToolCallDelta, Usage, WireProtocol};
use crate::catalog::ModelDescriptor;
use crate::context::{ContentPart, Context, Message, Role};
use crate::error::LlmError;
use crate::options::{CompletionOptions, Operation, ToolChoice};

pub struct OpenAiChat;

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn content_part_to_json(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } | ContentPart::Thinking { text } => json!({"type": "text", "text": text}),
        ContentPart::ImageUrl { url } => json!({"type": "image_url", "image_url": {"url": url}}),
        ContentPart::Image { data, media_type } => {
            use base64::{engine::general_purpose::STANDARD, Engine as _};
            let url = format!("data:{};base64,{}", media_type, STANDARD.encode(data));
            json!({"type": "image_url", "image_url": {"url": url}})
        }
        ContentPart::File { filename, .. } => json!({"type": "text", "text": format!("[file: {}]", filename)}),
    }
}

fn message_content_to_json(message: &Message) -> Value {
    if message.content.len() == 1 {
        if let Some(text) = message.content[0].as_text() {
            if !message.content[0].is_image() {
                return json!(text);
            }
        }
    }
    if message.content.is_empty() {
        return Value::Null;
    }
    Value::Array(message.content.iter().map(content_part_to_json).collect())
}

fn message_to_json(message: &Message) -> Value {
    let mut obj = Map::new();
    obj.insert("role".to_string(), json!(role_str(message.role)));
    obj.insert("content".to_string(), message_content_to_json(message));
    if let Some(tool_calls) = &message.tool_calls {
        let calls: Vec<Value> = tool_calls
            .iter()
            .map(|tc| {
                json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {"name": tc.function.name, "arguments": tc.function.arguments},
                })
            })
            .collect();
        obj.insert("tool_calls".to_string(), json!(calls));
    }
    if let Some(id) = &message.tool_call_id {
        obj.insert("tool_call_id".to_string(), json!(id));
    }
    Value::Object(obj)
}

fn tool_choice_to_json(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Tool { name } => json!({"type": "function", "function": {"name": name}}),
    }
}

impl WireProtocol for OpenAiChat {
    fn endpoint(&self, _model: &ModelDescriptor) -> String {
        "/chat/completions".to_string()
    }

    fn encode_body(&self, model: &ModelDescriptor, ctx: &Context, opts: &CompletionOptions) -> Result<Value, LlmError> {
        let mut body = Map::new();
        body.insert("model".to_string(), json!(model.id));
        body.insert(
            "messages".to_string(),
            json!(ctx.messages.iter().map(message_to_json).collect::<Vec<_>>()),
        );
        body.insert("stream".to_string(), json!(true));
        body.insert("stream_options".to_string(), json!({"include_usage": true}));

        if let Some(v) = opts.max_tokens {
            body.insert("max_tokens".to_string(), json!(v));
        }
        if let Some(v) = opts.max_completion_tokens {
            body.insert("max_completion_tokens".to_string(), json!(v));
        }
        if let Some(v) = opts.temperature {
            body.insert("temperature".to_string(), json!(v));
        }
        if let Some(v) = opts.top_p {
            body.insert("top_p".to_string(), json!(v));
        }

        if opts.operation == Some(Operation::Object) {
            if let Some(schema) = &opts.compiled_schema {
                body.insert(
                    "response_format".to_string(),
                    json!({
                        "type": "json_schema",
                        "json_schema": {
                            "name": "object",
                            "strict": true,
                            "schema": schema.as_json(),
                        }
                    }),
                );
            }
        }

        if let Some(tools) = &opts.tools {
            body.insert(
                "tools".to_string(),
                json!(tools.iter().map(|t| t.to_schema("openai")).collect::<Vec<_>>()),
            );
        }
        if let Some(choice) = &opts.tool_choice {
            body.insert("tool_choice".to_string(), tool_choice_to_json(choice));
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

        if let Some(error) = parsed.get("error") {
            let message = error.get("message").and_then(|v| v.as_str()).unwrap_or("unknown error").to_string();
            return vec![Chunk::Error(ChunkError {
                message,
                error_type: error.get("type").and_then(|v| v.as_str()).map(String::from),
                code: error.get("code").and_then(|v| v.as_str()).map(String::from),
            })];
        }

        let mut chunks = Vec::new();

        if let Some(choice) = parsed.get("choices").and_then(|c| c.get(0)) {
            if let Some(delta) = choice.get("delta") {
                if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
                    if !text.is_empty() {
                        chunks.push(Chunk::Text(text.to_string()));
                    }
                }
                if let Some(tool_calls) = delta.get("tool_calls").and_then(|v| v.as_array()) {
                    for tc in tool_calls {
                        let index = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
                        let function = tc.get("function");
                        chunks.push(Chunk::ToolCallDelta(ToolCallDelta {
                            index,
                            id: tc.get("id").and_then(|v| v.as_str()).map(String::from),
                            call_type: tc.get("type").and_then(|v| v.as_str()).map(String::from),
                            name: function.and_then(|f| f.get("name")).and_then(|v| v.as_str()).map(String::from),
                            arguments: function.and_then(|f| f.get("arguments")).and_then(|v| v.as_str()).map(String::from),
                            partial_json: None,
                        }));
                    }
                }
            }
            if let Some(reason) = choice.get("finish_reason").and_then(|v| v.as_str()) {
                chunks.push(Chunk::Meta(Meta {
                    terminal: true,
                    finish_reason: Some(parse_finish_reason(reason)),
                    response_id: parsed.get("id").and_then(|v| v.as_str()).map(String::from),
                }));
            }
        }

        if let Some(usage) = parsed.get("usage") {
            chunks.push(Chunk::Usage(Usage {
                input: usage.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                output: usage.get("completion_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                total: usage.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                reasoning: usage
                    .get("completion_tokens_details")
                    .and_then(|d| d.get("reasoning_tokens"))
                    .and_then(|v| v.as_u64())
                    .map(|v| v as u32),
                cache_read: None,
                cache_creation: None,
            }));
        }

        chunks
    }
}

fn parse_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::Length,
        "tool_calls" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        "error" => FinishReason::Error,
        _ => FinishReason::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CATALOG;
    use crate::context::Message;

    fn model() -> ModelDescriptor {
        CATALOG.lookup("openai", "gpt-4o-mini").unwrap()
    }

    #[test]
    fn encode_body_includes_model_and_stream() {
        let ctx = Context::new(vec![Message::user("hi")]);
        let body = OpenAiChat.encode_body(&model(), &ctx, &CompletionOptions::new()).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn decode_done_marker_yields_done_chunk() {
        let event = SseEvent { data: "[DONE]".into(), ..Default::default() };
        let chunks = OpenAiChat.decode(&event, &model());
        assert!(matches!(chunks[0], Chunk::Done));
    }

    #[test]
    fn decode_text_delta() {
        let event = SseEvent {
            data: r#"{"choices":[{"delta":{"content":"Hello"}}]}"#.into(),
            ..Default::default()
        };
        let chunks = OpenAiChat.decode(&event, &model());
        match &chunks[0] {
            Chunk::Text(t) => assert_eq!(t, "Hello"),
            other => panic!("expected text chunk, got {:?}", other),
        }
    }

    #[test]
    fn decode_usage_only_event() {
        let event = SseEvent {
            data: r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":5,"total_tokens":8}}"#.into(),
            ..Default::default()
        };
        let chunks = OpenAiChat.decode(&event, &model());
        match &chunks[0] {
            Chunk::Usage(u) => assert_eq!(u.total, 8),
            other => panic!("expected usage chunk, got {:?}", other),
        }
    }

    #[test]
    fn decode_unknown_event_yields_no_chunks() {
        let event = SseEvent { data: r#"{"foo":"bar"}"#.into(), ..Default::default() };
        assert!(OpenAiChat.decode(&event, &model()).is_empty());
    }
}
