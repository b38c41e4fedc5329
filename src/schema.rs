//! Schema compiler/validator (spec §3 "Compiled schema", §4.9 object mode).
//!
//! A schema can be supplied either as a field-schema keyword list (a compact,
//! ergonomic shorthand) or as a raw JSON Schema map. Both compile down to a
//! plain `serde_json::Value` JSON Schema document; the field-schema form is
//! the only one that actually needs compiling, the raw form passes through.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::LlmError;

/// A single field in a field-schema keyword list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// Primitive JSON Schema types recognized by the field-schema shorthand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    fn as_json_type(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

/// The two accepted shapes for a schema (spec §3 "Tool definition").
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// A compact field list, compiled into a JSON Schema object.
    Fields(Vec<FieldSchema>),
    /// A raw JSON Schema document, used as-is.
    Raw(Value),
}

impl From<Vec<FieldSchema>> for SchemaSource {
    fn from(fields: Vec<FieldSchema>) -> Self {
        SchemaSource::Fields(fields)
    }
}

impl From<Value> for SchemaSource {
    fn from(v: Value) -> Self {
        SchemaSource::Raw(v)
    }
}

fn compile_fields(fields: &[FieldSchema]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for f in fields {
        let mut prop = Map::new();
        prop.insert("type".to_string(), json!(f.field_type.as_json_type()));
        if let Some(desc) = &f.description {
            prop.insert("description".to_string(), json!(desc));
        }
        properties.insert(f.name.clone(), Value::Object(prop));
        if f.required {
            required.push(f.name.clone());
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// A resolved schema: the original source plus the JSON Schema document it
/// compiles to. Validation is pass-through (always succeeds) when the source
/// was a raw JSON Schema map, matching the teacher/source's "compiled
/// validator is nil for raw maps" behavior.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    schema: Value,
    pass_through: bool,
}

impl CompiledSchema {
    /// Compiles a `SchemaSource` into a `CompiledSchema`.
    ///
    /// The `jsonschema` validator is not stored here: storing a compiled
    /// `jsonschema::JSONSchema` would tie its lifetime to the `Value` it
    /// borrows from, producing a self-referential struct. Instead `validate`
    /// recompiles from the owned `Value` on each call.
    pub fn compile(source: SchemaSource) -> Result<Self, LlmError> {
        match source {
            SchemaSource::Fields(fields) => Ok(Self {
                schema: compile_fields(&fields),
                pass_through: false,
            }),
            SchemaSource::Raw(value) => Ok(Self {
                schema: value,
                pass_through: true,
            }),
        }
    }

    /// The JSON Schema document, as would be sent in a `response_format` or
    /// provider-specific schema projection.
    pub fn as_json(&self) -> &Value {
        &self.schema
    }

    /// Validates a decoded object against the schema. Always succeeds for a
    /// raw-map source (pass-through validation, spec §3).
    pub fn validate(&self, instance: &Value) -> Result<(), LlmError> {
        if self.pass_through {
            return Ok(());
        }
        let compiled = jsonschema::JSONSchema::compile(&self.schema)
            .map_err(|e| LlmError::ApiSchemaValidation { errors: vec![e.to_string()] })?;
        let result = compiled.validate(instance);
        if let Err(errors) = result {
            let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
            return Err(LlmError::ApiSchemaValidation { errors: messages });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_schema_compiles_required_and_types() {
        let source = SchemaSource::Fields(vec![
            FieldSchema { name: "name".into(), field_type: FieldType::String, required: true, description: None },
            FieldSchema { name: "age".into(), field_type: FieldType::Integer, required: true, description: None },
        ]);
        let compiled = CompiledSchema::compile(source).unwrap();
        let schema = compiled.as_json();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["name", "age"]));
    }

    #[test]
    fn valid_instance_passes() {
        let source = SchemaSource::Fields(vec![
            FieldSchema { name: "name".into(), field_type: FieldType::String, required: true, description: None },
            FieldSchema { name: "age".into(), field_type: FieldType::Integer, required: true, description: None },
        ]);
        let compiled = CompiledSchema::compile(source).unwrap();
        let instance = json!({"name": "Ada", "age": 30});
        assert!(compiled.validate(&instance).is_ok());
    }

    #[test]
    fn invalid_instance_fails() {
        let source = SchemaSource::Fields(vec![FieldSchema {
            name: "age".into(),
            field_type: FieldType::Integer,
            required: true,
            description: None,
        }]);
        let compiled = CompiledSchema::compile(source).unwrap();
        let instance = json!({"age": "not a number"});
        assert!(compiled.validate(&instance).is_err());
    }

    #[test]
    fn raw_schema_is_pass_through() {
        let compiled = CompiledSchema::compile(SchemaSource::Raw(json!({"type": "object"}))).unwrap();
        let instance = json!({"anything": true});
        assert!(compiled.validate(&instance).is_ok());
    }
}
