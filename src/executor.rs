//! Pipeline orchestrator: composes resolve/validate/constrain/adapt/encode
//! into the public `stream_text`/`generate_text`/`stream_object`/
//! `generate_object`/`embed` operations (spec §4.1).

use std::time::Duration;

use futures::StreamExt;
use once_cell::sync::Lazy;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::catalog::ModelDescriptor;
use crate::context::{Context, ContextInput};
use crate::embeddings::EmbeddingOutput;
use crate::error::LlmError;
use crate::fixtures::{fixture_mode, fixture_path, load_fixture, replay_stream, FixtureMode};
use crate::join::{join_stream, JoinedResponse};
use crate::model_spec::{resolve_model, ModelSpec};
use crate::options::{CompletionOptions, Operation};
use crate::providers::{resolve_api_key, ProviderConfig};
use crate::schema::{CompiledSchema, SchemaSource};
use crate::stream::{drive_stream, StreamResponse, TransportEvent};
use crate::validation::{validate_embedding_input, validate_request, EmbeddingInput};
use crate::wire::{resolve_wire, WireProtocol};

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Default fixture root used when a caller sets `opts.fixture` without
/// otherwise configuring a root; overridable via `LLMKIT_FIXTURES_ROOT`.
fn fixtures_root() -> std::path::PathBuf {
    std::env::var("LLMKIT_FIXTURES_ROOT")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("fixtures"))
}

/// A single request's fully-resolved pipeline state, shared by every public
/// entry point before the fixture/transport fork (spec §4.1 stages 1-5).
struct Prepared {
    model: ModelDescriptor,
    ctx: Context,
    opts: CompletionOptions,
    wire: Box<dyn WireProtocol + Send>,
}

fn prepare(spec: impl Into<ModelSpec>, input: impl Into<ContextInput>, opts: CompletionOptions, operation: Operation) -> Result<Prepared, LlmError> {
    let spec = spec.into();
    let model = resolve_model(spec, &opts)?;
    let ctx = Context::normalize(input, opts.system_prompt.as_deref())?;

    let mut opts = opts;
    opts.operation.get_or_insert(operation);

    validate_request(&model, &ctx, &opts, operation)?;

    let opts = crate::constraints::apply_constraints(&model, opts);
    let opts = crate::adapters::apply_adapters(&model, opts);

    let wire = resolve_wire(&model);

    Ok(Prepared { model, ctx, opts, wire })
}

/// Runs the fixture-or-live fork (spec §4.1 stages 6-8) and returns a handle.
async fn start_stream(prepared: Prepared) -> Result<StreamResponse, LlmError> {
    let Prepared { model, ctx, opts, wire } = prepared;
    let receive_timeout = opts.receive_timeout();

    if let Some(name) = &opts.fixture {
        if fixture_mode() == FixtureMode::Replay {
            let path = fixture_path(&fixtures_root(), &model.provider, &model.id, name);
            let record = load_fixture(&path)?;
            return replay_stream(model, wire, record, receive_timeout);
        }
    }

    let provider_config = ProviderConfig::for_provider(&model.provider, opts.base_url.clone());
    let api_key = resolve_api_key(&model.provider, &opts)?;
    let (auth_name, auth_value) = provider_config.auth_header(&api_key);

    let mut headers = vec![(auth_name.to_string(), auth_value), ("content-type".to_string(), "application/json".to_string())];
    headers.extend(wire.headers(&opts));

    let body = wire.encode_body(&model, &ctx, &opts)?;
    let url = format!("{}{}", provider_config.base_url, wire.endpoint(&model));

    let recorder = build_recorder(&opts, &model, &ctx, &url, &headers, &body)?;

    let mut request = HTTP_CLIENT.post(&url).header("accept", "text/event-stream");
    for (key, value) in &headers {
        request = request.header(key.as_str(), value.as_str());
    }
    let response = request.json(&body).send().await?;

    let status = response.status().as_u16();
    let response_headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        if tx.send(TransportEvent::Status(status)).await.is_err() {
            return;
        }
        if tx.send(TransportEvent::Headers(response_headers)).await.is_err() {
            return;
        }
        let mut byte_stream = response.bytes_stream();
        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    if tx.send(TransportEvent::Data(bytes.to_vec())).await.is_err() {
                        return;
                    }
                }
                Err(_) => break,
            }
        }
        let _ = tx.send(TransportEvent::Done).await;
    });

    Ok(drive_stream(model, wire, rx, recorder, receive_timeout))
}

/// Builds a `Recorder` only when fixture mode is `record` and `opts.fixture`
/// is set (spec §4.8 "Record").
fn build_recorder(
    opts: &CompletionOptions,
    model: &ModelDescriptor,
    ctx: &Context,
    url: &str,
    headers: &[(String, String)],
    body: &Value,
) -> Result<Option<crate::fixtures::Recorder>, LlmError> {
    let Some(name) = &opts.fixture else { return Ok(None) };
    if fixture_mode() != FixtureMode::Record {
        return Ok(None);
    }
    let path = fixture_path(&fixtures_root(), &model.provider, &model.id, name);
    let prompt = ctx.messages.last().map(|m| m.text()).unwrap_or_default();
    let body_bytes = serde_json::to_vec(body).unwrap_or_default();
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    let request = crate::fixtures::FixtureRequest {
        method: "POST".to_string(),
        url: url.to_string(),
        headers: headers.to_vec(),
        body: crate::fixtures::FixtureRequestBody { b64: STANDARD.encode(&body_bytes), canonical_json: Some(body.clone()) },
    };
    Ok(Some(crate::fixtures::Recorder::new(path, &model.provider, &model.id, &prompt, request, chrono_now())))
}

/// `captured_at` timestamp; `chrono::Utc::now()` wraps `SystemTime`, which
/// (unlike `Date.now()` in other runtimes) is an ordinary syscall here.
fn chrono_now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Runs stages 1-8 and returns a stream handle (spec §4.1).
pub async fn stream_text(spec: impl Into<ModelSpec>, input: impl Into<ContextInput>, opts: CompletionOptions) -> Result<StreamResponse, LlmError> {
    let prepared = prepare(spec, input, opts, Operation::Text)?;
    start_stream(prepared).await
}

/// A completed, buffered response (spec §3 "Buffered response").
#[derive(Debug, Clone)]
pub struct Response {
    pub model: ModelDescriptor,
    pub context: Context,
    pub text: String,
    pub tool_calls: Vec<crate::context::ToolCall>,
    pub object: Option<Value>,
    pub usage: Option<crate::wire::Usage>,
}

/// Calls `stream_text`, joins the sequence, and appends the resulting
/// assistant message to the context.
pub async fn generate_text(spec: impl Into<ModelSpec>, input: impl Into<ContextInput>, opts: CompletionOptions) -> Result<Response, LlmError> {
    let prepared = prepare(spec, input, opts, Operation::Text)?;
    let model = prepared.model.clone();
    let mut ctx = prepared.ctx.clone();
    let mut stream = start_stream(prepared).await?;
    let JoinedResponse { text, tool_calls, usage } = join_stream(&mut stream, &mut ctx).await?;
    Ok(Response { model, context: ctx, text, tool_calls, object: None, usage })
}

/// Compiles `schema`, injects `operation=object` + `compiled_schema`, and
/// otherwise behaves as `stream_text`.
pub async fn stream_object(
    spec: impl Into<ModelSpec>,
    input: impl Into<ContextInput>,
    schema: impl Into<SchemaSource>,
    mut opts: CompletionOptions,
) -> Result<StreamResponse, LlmError> {
    opts.compiled_schema = Some(CompiledSchema::compile(schema.into())?);
    let prepared = prepare(spec, input, opts, Operation::Object)?;
    start_stream(prepared).await
}

/// Joins `stream_object`'s sequence, parses the accumulated text as JSON,
/// and validates it against the compiled schema.
pub async fn generate_object(
    spec: impl Into<ModelSpec>,
    input: impl Into<ContextInput>,
    schema: impl Into<SchemaSource>,
    mut opts: CompletionOptions,
) -> Result<Response, LlmError> {
    let compiled = CompiledSchema::compile(schema.into())?;
    opts.compiled_schema = Some(compiled.clone());
    let prepared = prepare(spec, input, opts, Operation::Object)?;
    let model = prepared.model.clone();
    let mut ctx = prepared.ctx.clone();
    let mut stream = start_stream(prepared).await?;
    let JoinedResponse { text, tool_calls, usage } = join_stream(&mut stream, &mut ctx).await?;

    let object: Value = serde_json::from_str(&text)
        .map_err(|e| LlmError::ApiJsonParse { raw: text.clone(), source: e })?;
    compiled.validate(&object)?;

    Ok(Response { model, context: ctx, text, tool_calls, object: Some(object), usage })
}

/// Non-streaming embedding request (spec §4.7).
pub async fn embed(spec: impl Into<ModelSpec>, input: impl Into<EmbeddingInput>, opts: CompletionOptions) -> Result<EmbeddingOutput, LlmError> {
    let input = input.into();
    validate_embedding_input(&input)?;

    let model = resolve_model(spec, &opts)?;
    validate_request(&model, &Context::default(), &opts, Operation::Embed)?;

    let opts = crate::constraints::apply_constraints(&model, opts);
    let opts = crate::adapters::apply_adapters(&model, opts);
    let wire = resolve_wire(&model);

    let provider_config = ProviderConfig::for_provider(&model.provider, opts.base_url.clone());
    let api_key = resolve_api_key(&model.provider, &opts)?;
    let (auth_name, auth_value) = provider_config.auth_header(&api_key);

    let body = encode_embedding_request(&model, &input, &opts)?;

    let url = format!("{}{}", provider_config.base_url, wire.endpoint(&model));
    let response = HTTP_CLIENT
        .post(&url)
        .header(auth_name, auth_value)
        .header("content-type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        let body_text = response.text().await.unwrap_or_default();
        return Err(LlmError::ApiRequest { status, body: body_text });
    }

    let response_body: Value = response
        .json()
        .await
        .map_err(|e| LlmError::ApiResponse(format!("invalid embeddings response: {}", e)))?;

    let input_len = match &input {
        EmbeddingInput::Single(_) => 1,
        EmbeddingInput::Many(items) => items.len(),
    };
    let mut vectors = wire.extract_embeddings(&response_body, input_len)?;

    Ok(match input {
        EmbeddingInput::Single(_) => EmbeddingOutput::Single(vectors.pop().unwrap_or_default()),
        EmbeddingInput::Many(_) => EmbeddingOutput::Many(vectors),
    })
}

/// Builds the embeddings request body via the dedicated (non-trait) encoder;
/// `validate_operation` already guarantees `model.operation_kind()` is
/// `Embedding`, and every cataloged embedding model resolves to this wire.
fn encode_embedding_request(model: &ModelDescriptor, input: &EmbeddingInput, opts: &CompletionOptions) -> Result<Value, LlmError> {
    Ok(crate::wire::openai_embeddings::OpenAiEmbeddings.encode_embedding_body(model, input, opts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Message;

    #[test]
    fn embedding_request_body_matches_dedicated_encoder() {
        let model = crate::catalog::CATALOG.lookup("openai", "text-embedding-3-small").unwrap();
        let opts = CompletionOptions::new();
        let body = encode_embedding_request(&model, &EmbeddingInput::Single("hi".into()), &opts).unwrap();
        assert_eq!(body["input"], "hi");
    }

    #[test]
    fn prepare_rejects_unknown_model() {
        let err = prepare("openai:does-not-exist", "hi", CompletionOptions::new(), Operation::Text).unwrap_err();
        assert!(matches!(err, LlmError::ModelNotFound(_)));
    }

    #[test]
    fn prepare_normalizes_text_input_into_single_user_message() {
        let prepared = prepare("openai:gpt-4o-mini", "hi", CompletionOptions::new(), Operation::Text).unwrap();
        assert_eq!(prepared.ctx.messages.len(), 1);
        assert_eq!(prepared.ctx.messages[0].text(), "hi");
    }

    #[test]
    fn prepare_rejects_embed_operation_on_chat_model() {
        let err = prepare("openai:gpt-4o-mini", "hi", CompletionOptions::new(), Operation::Embed).unwrap_err();
        assert!(matches!(err, LlmError::InvalidCapability { .. }));
    }

    #[test]
    fn prepare_carries_existing_context_through_unchanged() {
        let ctx = Context::new(vec![Message::system("be terse"), Message::user("hi")]);
        let prepared = prepare("openai:gpt-4o-mini", ctx, CompletionOptions::new(), Operation::Text).unwrap();
        assert_eq!(prepared.ctx.messages.len(), 2);
    }
}
