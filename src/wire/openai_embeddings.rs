//! OpenAI-compatible Embeddings wire protocol (spec §4.7, §4.9).

use serde_json::{json, Value};

use super::{Chunk, SseEvent, WireProtocol};
use crate::catalog::ModelDescriptor;
use crate::context::Context;
use crate::error::LlmError;
use crate::options::CompletionOptions;
use crate::validation::EmbeddingInput;

pub struct OpenAiEmbeddings;

impl OpenAiEmbeddings {
    /// Builds the non-streaming embeddings request body (spec §4.7). `dimensions`
    /// and `encoding_format` are optional per the wire contract but have no
    /// slot in `CompletionOptions`'s enumerated field set (spec §9), so a
    /// request never sends them; the provider falls back to its defaults.
    pub fn encode_embedding_body(&self, model: &ModelDescriptor, input: &EmbeddingInput, _opts: &CompletionOptions) -> Value {
        let input_json = match input {
            EmbeddingInput::Single(s) => json!(s),
            EmbeddingInput::Many(items) => json!(items),
        };
        json!({ "model": model.id, "input": input_json })
    }
}

impl WireProtocol for OpenAiEmbeddings {
    fn endpoint(&self, _model: &ModelDescriptor) -> String {
        "/v1/embeddings".to_string()
    }

    fn encode_body(&self, model: &ModelDescriptor, ctx: &Context, opts: &CompletionOptions) -> Result<Value, LlmError> {
        let text = ctx.messages.last().map(|m| m.text()).unwrap_or_default();
        Ok(self.encode_embedding_body(model, &EmbeddingInput::Single(text), opts))
    }

    fn decode(&self, _event: &SseEvent, _model: &ModelDescriptor) -> Vec<Chunk> {
        // Embeddings are non-streaming; no SSE events are ever decoded.
        vec![]
    }

    fn extract_embeddings(&self, response: &Value, input_len: usize) -> Result<Vec<Vec<f32>>, LlmError> {
        let data = response
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| LlmError::ApiResponse("Invalid embedding response format".into()))?;

        let mut ordered: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
        for item in data {
            let index = item.get("index").and_then(|v| v.as_u64()).ok_or_else(|| {
                LlmError::ApiResponse("Invalid embedding response format".into())
            })? as usize;
            let embedding = item
                .get("embedding")
                .and_then(|v| v.as_array())
                .ok_or_else(|| LlmError::ApiResponse("Invalid embedding response format".into()))?
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            ordered.push((index, embedding));
        }
        ordered.sort_by_key(|(i, _)| *i);

        if ordered.len() != input_len {
            return Err(LlmError::ApiResponse("Invalid embedding response format".into()));
        }
        Ok(ordered.into_iter().map(|(_, v)| v).collect())
    }
}
