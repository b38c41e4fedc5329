//! Model specification resolution (spec §4.1 "Resolve" stage, §6 grammar).

use crate::catalog::{ModelDescriptor, CATALOG};
use crate::error::LlmError;
use crate::options::CompletionOptions;

/// One of the accepted shapes for identifying a model (spec §4.1 "Spec
/// formats accepted"). The keyword and tuple-with-opts variants from the
/// distilled spec fold into a plain `(provider, id)` pair plus a separate,
/// always-present `CompletionOptions` argument threaded alongside the spec
/// through the executor — see DESIGN.md's Open Question decision.
#[derive(Debug, Clone)]
pub enum ModelSpec {
    /// `"provider:id"`.
    String(String),
    /// `(provider, id)`.
    Pair(String, String),
    /// A descriptor resolved (or constructed) ahead of time; passed through.
    Descriptor(Box<ModelDescriptor>),
}

impl From<&str> for ModelSpec {
    fn from(s: &str) -> Self {
        ModelSpec::String(s.to_string())
    }
}

impl From<String> for ModelSpec {
    fn from(s: String) -> Self {
        ModelSpec::String(s)
    }
}

impl From<(&str, &str)> for ModelSpec {
    fn from((provider, id): (&str, &str)) -> Self {
        ModelSpec::Pair(provider.to_string(), id.to_string())
    }
}

impl From<ModelDescriptor> for ModelSpec {
    fn from(d: ModelDescriptor) -> Self {
        ModelSpec::Descriptor(Box::new(d))
    }
}

impl ModelSpec {
    /// Parses a `"provider:id"` string, the grammar in spec §6.
    fn parse_string(s: &str) -> Result<(String, String), LlmError> {
        let mut parts = s.splitn(2, ':');
        let provider = parts.next().filter(|p| !p.is_empty());
        let id = parts.next().filter(|p| !p.is_empty());
        match (provider, id) {
            (Some(p), Some(i)) => Ok((p.to_string(), i.to_string())),
            _ => Err(LlmError::InvalidModelSpec(s.to_string())),
        }
    }

    /// Resolves this spec to a model descriptor via the catalog (pipeline
    /// stage 1). Accepts an already-resolved descriptor unchanged.
    pub fn resolve(&self) -> Result<ModelDescriptor, LlmError> {
        match self {
            ModelSpec::String(s) => {
                let (provider, id) = Self::parse_string(s)?;
                CATALOG.lookup(&provider, &id)
            }
            ModelSpec::Pair(provider, id) => CATALOG.lookup(provider, id),
            ModelSpec::Descriptor(d) => Ok((**d).clone()),
        }
    }
}

/// Merges a caller-supplied `CompletionOptions` with nothing else; kept as a
/// named entry point so the executor's stage-1 call reads the same way
/// regardless of which `ModelSpec` variant was passed.
pub fn resolve_model(spec: impl Into<ModelSpec>, _opts: &CompletionOptions) -> Result<ModelDescriptor, LlmError> {
    spec.into().resolve()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_model_from_string() {
        let d = resolve_model("openai:gpt-4o-mini", &CompletionOptions::new()).unwrap();
        assert_eq!(d.provider, "openai");
        assert_eq!(d.id, "gpt-4o-mini");
    }

    #[test]
    fn unknown_model_is_model_not_found() {
        let err = resolve_model("openai:nonexistent", &CompletionOptions::new()).unwrap_err();
        assert!(matches!(err, LlmError::ModelNotFound(_)));
    }

    #[test]
    fn malformed_spec_string_is_invalid_model_spec() {
        let err = resolve_model("not-a-spec", &CompletionOptions::new()).unwrap_err();
        assert!(matches!(err, LlmError::InvalidModelSpec(_)));
    }
}
