//! Context model: ordered messages of typed content parts (spec §3, §4.2).

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// The role of a message's sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tagged content part within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Thinking { text: String },
    Image { data: Vec<u8>, media_type: String },
    ImageUrl { url: String },
    File { data: Vec<u8>, filename: String, media_type: String },
}

impl ContentPart {
    pub fn text(s: impl Into<String>) -> Self {
        ContentPart::Text { text: s.into() }
    }

    /// `Some(text)` when this part carries plain or thinking text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } | ContentPart::Thinking { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ContentPart::Image { .. } | ContentPart::ImageUrl { .. })
    }
}

/// A tool call requested by an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: ToolCallFunction,
}

/// The function payload of a `ToolCall`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// JSON-encoded argument string.
    pub arguments: String,
}

impl ToolCall {
    /// Generates an id of the form `call_<12-random-bytes-base64url>` (spec §3).
    pub fn generate_id() -> String {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
        let mut bytes = [0u8; 12];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        format!("call_{}", URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn new(id: Option<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.unwrap_or_else(Self::generate_id),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// A single message in a `Context`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Vec<ContentPart>,
    /// Present only for assistant messages that requested tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Present only for tool messages: the call this message responds to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Present only for tool messages: the tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentPart::text(text)],
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::text(text)],
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant(content: Vec<ContentPart>, tool_calls: Option<Vec<ToolCall>>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: vec![ContentPart::text(text)],
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            name: None,
        }
    }

    /// Concatenation of all plain-text content parts.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(ContentPart::as_text).collect()
    }

    pub fn has_image(&self) -> bool {
        self.content.iter().any(ContentPart::is_image)
    }
}

/// An ordered list of messages forming a conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    pub messages: Vec<Message>,
}

/// Accepted shapes when normalizing caller input into a `Context` (spec §4.2).
pub enum ContextInput {
    Text(String),
    Message(Message),
    Messages(Vec<Message>),
    Context(Context),
    /// A loose `{role, content}` map, as a caller might build by hand.
    Loose(serde_json::Value),
}

impl From<&str> for ContextInput {
    fn from(s: &str) -> Self {
        ContextInput::Text(s.to_string())
    }
}

impl From<String> for ContextInput {
    fn from(s: String) -> Self {
        ContextInput::Text(s)
    }
}

impl From<Message> for ContextInput {
    fn from(m: Message) -> Self {
        ContextInput::Message(m)
    }
}

impl From<Vec<Message>> for ContextInput {
    fn from(m: Vec<Message>) -> Self {
        ContextInput::Messages(m)
    }
}

impl From<Context> for ContextInput {
    fn from(c: Context) -> Self {
        ContextInput::Context(c)
    }
}

impl From<serde_json::Value> for ContextInput {
    fn from(v: serde_json::Value) -> Self {
        ContextInput::Loose(v)
    }
}

impl Context {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Normalizes caller input into a validated `Context`, optionally prepending
    /// a system message built from `system_prompt` if none is already present.
    pub fn normalize(input: impl Into<ContextInput>, system_prompt: Option<&str>) -> Result<Self, LlmError> {
        let mut ctx = match input.into() {
            ContextInput::Text(s) => Context::new(vec![Message::user(s)]),
            ContextInput::Message(m) => Context::new(vec![m]),
            ContextInput::Messages(m) => Context::new(m),
            ContextInput::Context(c) => c,
            ContextInput::Loose(v) => {
                let role = v.get("role").and_then(|r| r.as_str()).unwrap_or("user");
                let content = v.get("content").and_then(|c| c.as_str()).unwrap_or_default();
                let role = match role {
                    "system" => Role::System,
                    "assistant" => Role::Assistant,
                    "tool" => Role::Tool,
                    _ => Role::User,
                };
                Context::new(vec![Message {
                    role,
                    content: vec![ContentPart::text(content)],
                    tool_calls: None,
                    tool_call_id: v.get("tool_call_id").and_then(|t| t.as_str()).map(String::from),
                    name: v.get("name").and_then(|n| n.as_str()).map(String::from),
                }])
            }
        };

        if let Some(prompt) = system_prompt {
            if !ctx.messages.iter().any(|m| m.role == Role::System) {
                ctx.messages.insert(0, Message::system(prompt));
            }
        }

        ctx.validate()?;
        Ok(ctx)
    }

    /// Enforces: at most one system message; every tool message carries a
    /// non-empty `tool_call_id` (spec §3 invariants).
    pub fn validate(&self) -> Result<(), LlmError> {
        let system_count = self.messages.iter().filter(|m| m.role == Role::System).count();
        if system_count > 1 {
            return Err(LlmError::ValidationError(
                "context carries more than one system message".into(),
            ));
        }
        for m in &self.messages {
            if m.role == Role::Tool {
                match &m.tool_call_id {
                    Some(id) if !id.is_empty() => {}
                    _ => {
                        return Err(LlmError::ValidationError(
                            "tool message missing non-empty tool_call_id".into(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn has_image_input(&self) -> bool {
        self.messages.iter().any(Message::has_image)
    }

    pub fn system_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == Role::System)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_from_text_wraps_single_user_message() {
        let ctx = Context::normalize("Hello!", None).unwrap();
        assert_eq!(ctx.messages.len(), 1);
        assert_eq!(ctx.messages[0].role, Role::User);
        assert_eq!(ctx.messages[0].text(), "Hello!");
    }

    #[test]
    fn normalize_prepends_system_prompt_when_absent() {
        let ctx = Context::normalize("Hi", Some("be terse")).unwrap();
        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.messages[0].role, Role::System);
    }

    #[test]
    fn normalize_does_not_duplicate_existing_system_message() {
        let messages = vec![Message::system("existing"), Message::user("hi")];
        let ctx = Context::normalize(messages, Some("ignored")).unwrap();
        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.messages[0].text(), "existing");
    }

    #[test]
    fn validate_rejects_multiple_system_messages() {
        let ctx = Context::new(vec![Message::system("a"), Message::system("b")]);
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn validate_rejects_tool_message_without_call_id() {
        let mut m = Message::tool_result("call_1", "result");
        m.tool_call_id = None;
        let ctx = Context::new(vec![m]);
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn tool_call_generated_id_has_expected_prefix() {
        let id = ToolCall::generate_id();
        assert!(id.starts_with("call_"));
        assert!(id.len() > "call_".len());
    }
}
