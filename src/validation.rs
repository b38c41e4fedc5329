//! Pipeline validation stage (spec §4.4).

use crate::catalog::{Modality, ModelDescriptor, ModelKind};
use crate::context::Context;
use crate::error::LlmError;
use crate::options::{CompletionOptions, Operation};

/// Validates the requested operation against the model's inferred kind.
pub fn validate_operation(model: &ModelDescriptor, operation: Operation) -> Result<(), LlmError> {
    let kind = model.operation_kind();
    match (kind, operation) {
        (ModelKind::Embedding, Operation::Text) | (ModelKind::Embedding, Operation::Object) => {
            Err(LlmError::InvalidCapability { missing: vec!["chat".to_string()] })
        }
        (ModelKind::Chat, Operation::Embed) | (ModelKind::Reasoning, Operation::Embed) => {
            Err(LlmError::InvalidCapability { missing: vec!["embeddings".to_string()] })
        }
        _ => Ok(()),
    }
}

/// Rejects image content when the model lacks vision input support.
pub fn validate_modality(model: &ModelDescriptor, ctx: &Context) -> Result<(), LlmError> {
    if ctx.has_image_input() && !model.input_modalities.contains(&Modality::Image) {
        return Err(LlmError::InvalidCapability { missing: vec!["vision".to_string()] });
    }
    Ok(())
}

/// Rejects tool/streaming options the model's capability map doesn't support.
pub fn validate_capability(model: &ModelDescriptor, opts: &CompletionOptions) -> Result<(), LlmError> {
    if opts.tools.is_some() && !model.capabilities.tools.enabled {
        return Err(LlmError::InvalidCapability { missing: vec!["tools".to_string()] });
    }
    if opts.stream && !model.capabilities.streaming.text {
        return Err(LlmError::InvalidCapability { missing: vec!["streaming".to_string()] });
    }
    Ok(())
}

/// Input shapes accepted by `embed` (spec §4.1/§4.4).
pub enum EmbeddingInput {
    Single(String),
    Many(Vec<String>),
}

impl From<&str> for EmbeddingInput {
    fn from(s: &str) -> Self {
        EmbeddingInput::Single(s.to_string())
    }
}

impl From<String> for EmbeddingInput {
    fn from(s: String) -> Self {
        EmbeddingInput::Single(s)
    }
}

impl From<Vec<String>> for EmbeddingInput {
    fn from(v: Vec<String>) -> Self {
        EmbeddingInput::Many(v)
    }
}

/// Rejects empty strings, empty lists, and lists containing an empty string.
pub fn validate_embedding_input(input: &EmbeddingInput) -> Result<(), LlmError> {
    match input {
        EmbeddingInput::Single(s) if s.is_empty() => {
            Err(LlmError::InvalidParameter("embedding input must not be empty".into()))
        }
        EmbeddingInput::Many(items) if items.is_empty() => {
            Err(LlmError::InvalidParameter("embedding input list must not be empty".into()))
        }
        EmbeddingInput::Many(items) if items.iter().any(|s| s.is_empty()) => Err(
            LlmError::InvalidParameter("embedding input list must not contain an empty string".into()),
        ),
        _ => Ok(()),
    }
}

/// Runs every stage-2 validation check in order (spec §4.1 "Validate").
pub fn validate_request(
    model: &ModelDescriptor,
    ctx: &Context,
    opts: &CompletionOptions,
    operation: Operation,
) -> Result<(), LlmError> {
    validate_operation(model, operation)?;
    validate_modality(model, ctx)?;
    validate_capability(model, opts)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CATALOG;
    use crate::context::Context;

    #[test]
    fn embedding_model_rejects_text_operation() {
        let model = CATALOG.lookup("openai", "text-embedding-3-small").unwrap();
        let err = validate_operation(&model, Operation::Text).unwrap_err();
        assert!(matches!(err, LlmError::InvalidCapability { .. }));
    }

    #[test]
    fn chat_model_rejects_embed_operation() {
        let model = CATALOG.lookup("openai", "gpt-4o-mini").unwrap();
        let err = validate_operation(&model, Operation::Embed).unwrap_err();
        assert!(matches!(err, LlmError::InvalidCapability { .. }));
    }

    #[test]
    fn embed_rejects_empty_string() {
        let err = validate_embedding_input(&EmbeddingInput::Single(String::new())).unwrap_err();
        assert!(matches!(err, LlmError::InvalidParameter(_)));
    }

    #[test]
    fn embed_rejects_list_with_empty_item() {
        let err = validate_embedding_input(&EmbeddingInput::Many(vec!["ok".into(), "".into()])).unwrap_err();
        assert!(matches!(err, LlmError::InvalidParameter(_)));
    }

    #[test]
    fn modality_rejects_image_without_vision_capability() {
        let model = CATALOG.lookup("openai", "text-embedding-3-small").unwrap();
        let mut ctx = Context::default();
        ctx.push(crate::context::Message::assistant(
            vec![crate::context::ContentPart::ImageUrl { url: "http://x".into() }],
            None,
        ));
        assert!(validate_modality(&model, &ctx).is_err());
    }
}
