//! Read-only model catalog: lookup of model metadata by `provider:id`.
//!
//! The catalog is loaded once from a bundled JSON data file (see
//! `catalog_data/models.json`) and never mutated afterwards. Lookups return
//! owned copies so callers can't observe or corrupt shared state (spec §3:
//! "descriptors are immutable snapshots; lookups return a copy").

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Input/output modality a model may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Plain text.
    Text,
    /// Still images.
    Image,
    /// Audio.
    Audio,
    /// PDF documents.
    Pdf,
    /// Embedding vectors (output-only in practice).
    Embedding,
}

/// Tool-calling capability flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ToolCapabilities {
    /// Tool/function calling is supported at all.
    #[serde(default)]
    pub enabled: bool,
    /// Tool calls can be streamed incrementally.
    #[serde(default)]
    pub streaming: bool,
    /// Strict JSON-schema-conformant tool arguments are supported.
    #[serde(default)]
    pub strict: bool,
    /// Multiple tool calls may be requested in parallel.
    #[serde(default)]
    pub parallel: bool,
}

/// Structured JSON output capability flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JsonCapabilities {
    /// The provider has first-class JSON mode.
    #[serde(default)]
    pub native: bool,
    /// A JSON Schema can be supplied to constrain output.
    #[serde(default)]
    pub schema: bool,
    /// Schema conformance is strictly enforced.
    #[serde(default)]
    pub strict: bool,
}

/// Streaming capability flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StreamingCapabilities {
    /// Text deltas can be streamed.
    #[serde(default)]
    pub text: bool,
    /// Tool call deltas can be streamed.
    #[serde(default)]
    pub tool_calls: bool,
}

/// The full capability map for a model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Chat/completion is supported.
    #[serde(default)]
    pub chat: bool,
    /// Embedding generation is supported.
    #[serde(default)]
    pub embeddings: bool,
    /// The model can reason (emit thinking/reasoning content).
    #[serde(default)]
    pub reasoning_enabled: bool,
    /// Tool-calling capability detail.
    #[serde(default)]
    pub tools: ToolCapabilities,
    /// JSON output capability detail.
    #[serde(default)]
    pub json: JsonCapabilities,
    /// Streaming capability detail.
    #[serde(default)]
    pub streaming: StreamingCapabilities,
}

/// Token limits for a model.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum total context window, in tokens.
    #[serde(default)]
    pub context: u32,
    /// Maximum output tokens per request.
    #[serde(default)]
    pub output: u32,
}

/// An immutable snapshot of a model's identity, capabilities, and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Provider identifier, e.g. `"openai"`.
    pub provider: String,
    /// Model identifier within the provider, e.g. `"gpt-4o-mini"`.
    pub id: String,
    /// Capability map.
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Supported input modalities.
    #[serde(default)]
    pub input_modalities: Vec<Modality>,
    /// Supported output modalities.
    #[serde(default)]
    pub output_modalities: Vec<Modality>,
    /// Context/output token limits.
    #[serde(default)]
    pub limits: Limits,
    /// Free-form provider/wire-specific metadata (`wire.protocol`, `api`,
    /// `kind`/`type`, `constraints`, ...).
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl ModelDescriptor {
    /// Fully-qualified `provider:id` spec string for this descriptor.
    pub fn spec_string(&self) -> String {
        format!("{}:{}", self.provider, self.id)
    }

    /// Reads `extra.wire.protocol` if present.
    pub fn wire_protocol(&self) -> Option<&str> {
        self.extra.get("wire")?.get("protocol")?.as_str()
    }

    /// Reads `extra.api` if present.
    pub fn api(&self) -> Option<&str> {
        self.extra.get("api")?.as_str()
    }

    /// Reads `extra.kind`, falling back to `extra.type == "embedding"`,
    /// falling back to an inference from capabilities (spec §4.4).
    pub fn operation_kind(&self) -> ModelKind {
        if let Some(kind) = self.extra.get("kind").and_then(|v| v.as_str()) {
            return ModelKind::from_str(kind);
        }
        if self.extra.get("type").and_then(|v| v.as_str()) == Some("embedding") {
            return ModelKind::Embedding;
        }
        if self.capabilities.embeddings {
            ModelKind::Embedding
        } else if self.capabilities.reasoning_enabled {
            ModelKind::Reasoning
        } else {
            ModelKind::Chat
        }
    }

    /// Reads `extra.constraints` as a JSON object, defaulting to empty.
    pub fn constraints(&self) -> serde_json::Map<String, serde_json::Value> {
        self.extra
            .get("constraints")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default()
    }
}

/// The inferred or declared kind of operation a model primarily serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Plain chat/completion.
    Chat,
    /// Chat with reasoning/thinking support.
    Reasoning,
    /// Embedding generation only.
    Embedding,
}

impl ModelKind {
    fn from_str(s: &str) -> Self {
        match s {
            "embedding" => ModelKind::Embedding,
            "reasoning" => ModelKind::Reasoning,
            _ => ModelKind::Chat,
        }
    }
}

/// Bundled catalog data, embedded at compile time so lookups never touch the
/// filesystem at runtime.
const CATALOG_JSON: &str = include_str!("../catalog_data/models.json");

/// A read-only, process-wide registry of model descriptors.
pub struct ModelCatalog {
    by_key: HashMap<(String, String), ModelDescriptor>,
}

impl ModelCatalog {
    fn load() -> Self {
        let descriptors: Vec<ModelDescriptor> =
            serde_json::from_str(CATALOG_JSON).expect("bundled catalog_data/models.json is malformed");
        let mut by_key = HashMap::with_capacity(descriptors.len());
        for d in descriptors {
            by_key.insert((d.provider.clone(), d.id.clone()), d);
        }
        Self { by_key }
    }

    /// Looks up a model by provider and id, returning an owned copy.
    pub fn lookup(&self, provider: &str, id: &str) -> Result<ModelDescriptor, LlmError> {
        self.by_key
            .get(&(provider.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| LlmError::ModelNotFound(format!("{}:{}", provider, id)))
    }

    /// Lists all descriptors for a given provider.
    pub fn list_for(&self, provider: &str) -> Vec<ModelDescriptor> {
        self.by_key
            .values()
            .filter(|d| d.provider == provider)
            .cloned()
            .collect()
    }
}

/// The process-wide catalog instance, initialized lazily on first access.
pub static CATALOG: Lazy<ModelCatalog> = Lazy::new(ModelCatalog::load);
