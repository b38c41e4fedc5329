#![warn(missing_docs)]
//! A unified client library for OpenAI, Anthropic, and OpenAI-compatible LLM
//! providers: one model catalog, one context format, and one streaming chunk
//! protocol behind `stream_text`/`generate_text`/`stream_object`/
//! `generate_object`/`embed`.

pub mod adapters;
pub mod catalog;
pub mod constraints;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod executor;
pub mod fixtures;
pub mod join;
pub mod model_spec;
pub mod options;
pub mod providers;
pub mod schema;
pub mod stream;
pub mod tools;
pub mod validation;
pub mod wire;

pub use catalog::{Capabilities, Limits, ModelDescriptor, ModelKind, Modality, CATALOG};
pub use context::{ContentPart, Context, ContextInput, Message, Role, ToolCall, ToolCallFunction};
pub use embeddings::{cosine_similarity, EmbeddingOutput};
pub use error::LlmError;
pub use executor::{embed, generate_object, generate_text, stream_object, stream_text, Response};
pub use join::{join_stream, JoinedResponse};
pub use model_spec::ModelSpec;
pub use options::{CompletionOptions, Operation, ReasoningEffort, ThinkingOptions, ToolChoice};
pub use providers::{resolve_api_key, set_credential, AuthStyle, ProviderConfig};
pub use schema::{CompiledSchema, FieldSchema, FieldType, SchemaSource};
pub use stream::{CancelHandle, StreamResponse};
pub use tools::{execute_tool, get_all_tools, get_tools_by_names, register_tool, Tool, ToolExecutor, ToolRegistry};
pub use validation::EmbeddingInput;
pub use wire::{Chunk, Usage};

#[cfg(feature = "macros")]
pub use tools::llm_tool;
