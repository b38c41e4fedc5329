//! Tool definitions, the global tool registry, and per-provider schema
//! projection (spec §3 "Tool definition", §4.9, §8 invariants 6-7).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::error::LlmError;
use crate::schema::{CompiledSchema, SchemaSource};

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Validates a tool name against spec §8 invariant 7.
pub fn validate_tool_name(name: &str) -> Result<(), LlmError> {
    if name.len() > 64 || !NAME_RE.is_match(name) {
        return Err(LlmError::InvalidParameter(format!(
            "tool name {:?} must match ^[A-Za-z_][A-Za-z0-9_]*$ and be <= 64 chars",
            name
        )));
    }
    Ok(())
}

/// Callback executed with the JSON-encoded argument string; returns a
/// JSON-encoded (or plain text) result string.
pub type ToolExecutor = Arc<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// A tool (function) that the model may call.
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: CompiledSchema,
    pub strict: bool,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: SchemaSource, strict: bool) -> Result<Self, LlmError> {
        let name = name.into();
        validate_tool_name(&name)?;
        Ok(Self {
            name,
            description: description.into(),
            parameters: CompiledSchema::compile(parameters)?,
            strict,
        })
    }

    /// Projects this tool into the wire shape a given provider expects.
    /// Deterministic; always contains `name` (spec §8 invariant 6).
    pub fn to_schema(&self, provider: &str) -> Value {
        let parameters = self.parameters.as_json().clone();
        match provider {
            "anthropic" => {
                let mut obj = json!({
                    "name": self.name,
                    "description": self.description,
                    "input_schema": parameters,
                });
                if self.strict {
                    obj["strict"] = json!(true);
                }
                obj
            }
            "openai" | "groq" | "openrouter" | "xai" | _ => {
                let mut function = json!({
                    "name": self.name,
                    "description": self.description,
                    "parameters": parameters,
                });
                if self.strict {
                    function["strict"] = json!(true);
                }
                json!({ "type": "function", "function": function })
            }
        }
    }
}

/// A registry mapping tool name to definition + executor.
pub struct ToolRegistry {
    tools: HashMap<String, (Tool, ToolExecutor)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Tool, executor: ToolExecutor) {
        self.tools.insert(tool.name.clone(), (tool, executor));
    }

    pub fn get_tools(&self) -> Vec<Tool> {
        self.tools.values().map(|(tool, _)| tool.clone()).collect()
    }

    pub fn get_by_names(&self, names: &[&str]) -> Vec<Tool> {
        names
            .iter()
            .filter_map(|name| self.tools.get(*name).map(|(tool, _)| tool.clone()))
            .collect()
    }

    pub fn execute(&self, name: &str, args: &str) -> Result<String, String> {
        match self.tools.get(name) {
            Some((_, executor)) => executor(args),
            None => Err(format!("tool '{}' not found in registry", name)),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<Mutex<ToolRegistry>> = Arc::new(Mutex::new(ToolRegistry::new()));
}

/// Registers a tool in the process-wide registry.
pub fn register_tool(tool: Tool, executor: ToolExecutor) {
    if let Ok(mut registry) = GLOBAL_REGISTRY.lock() {
        registry.register(tool, executor);
    } else {
        tracing::warn!("failed to lock global tool registry for registration");
    }
}

/// Entry point used by the `#[llm_tool]` proc-macro's generated `ctor`.
#[doc(hidden)]
pub fn __register_macro_tool(tool: Tool, executor_fn: impl Fn(&str) -> Result<String, String> + Send + Sync + 'static) {
    register_tool(tool, Arc::new(executor_fn));
}

pub fn get_all_tools() -> Vec<Tool> {
    GLOBAL_REGISTRY.lock().map(|r| r.get_tools()).unwrap_or_default()
}

pub fn get_tools_by_names(names: &[&str]) -> Vec<Tool> {
    match GLOBAL_REGISTRY.lock() {
        Ok(r) => r.get_by_names(names),
        Err(e) => {
            tracing::warn!(error = %e, "failed to lock global tool registry");
            Vec::new()
        }
    }
}

pub fn execute_tool(name: &str, args: &str) -> Result<String, String> {
    GLOBAL_REGISTRY
        .lock()
        .map_err(|e| format!("failed to lock registry: {}", e))?
        .execute(name, args)
}

#[cfg(feature = "macros")]
pub use llmkit_macros::llm_tool;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSchema, FieldType};

    fn add_tool() -> Tool {
        Tool::new(
            "add",
            "Add two numbers",
            SchemaSource::Fields(vec![
                FieldSchema { name: "a".into(), field_type: FieldType::Integer, required: true, description: None },
                FieldSchema { name: "b".into(), field_type: FieldType::Integer, required: true, description: None },
            ]),
            false,
        )
        .unwrap()
    }

    #[test]
    fn registry_register_and_execute() {
        let mut registry = ToolRegistry::new();
        let executor: ToolExecutor = Arc::new(|args| {
            let v: Value = serde_json::from_str(args).unwrap();
            let a = v["a"].as_i64().unwrap_or(0);
            let b = v["b"].as_i64().unwrap_or(0);
            Ok((a + b).to_string())
        });
        registry.register(add_tool(), executor);

        assert_eq!(registry.get_tools().len(), 1);
        assert_eq!(registry.execute("add", r#"{"a":5,"b":3}"#), Ok("8".to_string()));
        assert!(registry.execute("multiply", "{}").is_err());
    }

    #[test]
    fn to_schema_openai_and_anthropic_both_contain_name() {
        let tool = add_tool();
        let openai = tool.to_schema("openai");
        let anthropic = tool.to_schema("anthropic");
        assert_eq!(openai["function"]["name"], "add");
        assert_eq!(anthropic["name"], "add");
    }

    #[test]
    fn invalid_tool_name_rejected() {
        assert!(validate_tool_name("1bad").is_err());
        assert!(validate_tool_name(&"a".repeat(65)).is_err());
        assert!(validate_tool_name("good_name").is_ok());
    }
}
