//! End-to-end scenarios against fixtures committed under `fixtures/`.

mod init_logging;

use llmkit::{
    cosine_similarity, embed, generate_object, generate_text, join_stream, stream_text, Chunk, CompletionOptions,
    Context, FieldSchema, FieldType, LlmError, SchemaSource,
};

fn person_schema() -> SchemaSource {
    SchemaSource::Fields(vec![
        FieldSchema { name: "name".into(), field_type: FieldType::String, required: true, description: None },
        FieldSchema { name: "age".into(), field_type: FieldType::Integer, required: true, description: None },
    ])
}

#[tokio::test]
async fn basic_text_returns_non_empty_response() {
    let opts = CompletionOptions::new().with_fixture("basic");
    let response = generate_text("openai:gpt-4o-mini", "Hello!", opts).await.unwrap();
    assert!(!response.text.is_empty());
    assert_eq!(response.model.id, "gpt-4o-mini");
    assert_eq!(response.model.provider, "openai");
}

#[tokio::test]
async fn streaming_yields_same_text_as_basic_text() {
    let opts = CompletionOptions::new().with_fixture("basic");
    let mut stream = stream_text("openai:gpt-4o-mini", "Hello!", opts).await.unwrap();

    let mut text = String::new();
    let mut text_chunks = 0;
    while let Some(chunk) = stream.next().await {
        if let Chunk::Text(delta) = chunk.unwrap() {
            text.push_str(&delta);
            text_chunks += 1;
        }
    }

    assert!(text_chunks >= 1);
    assert_eq!(text, "Hello! How can I help you today?");
}

#[tokio::test]
async fn unknown_model_is_model_not_found() {
    let err = stream_text("openai:nonexistent", "Hi", CompletionOptions::new()).await.unwrap_err();
    assert!(matches!(err, LlmError::ModelNotFound(_)));
}

#[tokio::test]
async fn object_mode_produces_schema_shaped_value() {
    let opts = CompletionOptions::new().with_fixture("person_object");
    let response = generate_object("openai:gpt-4o-mini", "Generate a person", person_schema(), opts).await.unwrap();
    let object = response.object.unwrap();
    assert!(object["name"].as_str().is_some_and(|s| !s.is_empty()));
    assert!(object["age"].as_i64().is_some());
}

#[tokio::test]
async fn embedding_rejects_empty_input() {
    let err = embed("openai:text-embedding-3-small", "", CompletionOptions::new()).await.unwrap_err();
    assert!(matches!(err, LlmError::InvalidParameter(_)));
}

#[tokio::test]
async fn embed_on_a_chat_model_is_a_capability_error() {
    let err = embed("openai:gpt-4o-mini", "hi", CompletionOptions::new()).await.unwrap_err();
    match err {
        LlmError::InvalidCapability { missing } => assert!(missing.iter().any(|m| m == "embeddings")),
        other => panic!("expected InvalidCapability, got {:?}", other),
    }
}

#[test]
fn cosine_similarity_matches_the_documented_bounds() {
    assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]), -1.0);
}

#[tokio::test]
async fn multi_turn_join_concatenates_text_deltas_in_order() {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use llmkit::fixtures::{replay_stream, FixtureRecord, FixtureRequest, FixtureRequestBody, FixtureResponse};
    use llmkit::wire::resolve_wire;
    use llmkit::CATALOG;
    use std::time::Duration;

    let model = CATALOG.lookup("openai", "gpt-4o-mini").unwrap();
    let wire = resolve_wire(&model);
    let record = FixtureRecord {
        provider: "openai".into(),
        model_id: "gpt-4o-mini".into(),
        prompt: "Hello".into(),
        captured_at: "2026-01-01T00:00:00Z".into(),
        request: FixtureRequest {
            method: "POST".into(),
            url: "https://api.openai.com/v1/chat/completions".into(),
            headers: vec![],
            body: FixtureRequestBody { b64: String::new(), canonical_json: None },
        },
        response: FixtureResponse { status: 200, headers: vec![] },
        chunks: ["Hello", " ", "world"]
            .iter()
            .map(|piece| {
                let data = format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{}\"}}}}]}}\n\n", piece);
                STANDARD.encode(data.as_bytes())
            })
            .chain(std::iter::once(STANDARD.encode(b"data: [DONE]\n\n")))
            .collect(),
    };

    let mut stream = replay_stream(model, wire, record, Duration::from_secs(5)).unwrap();
    let mut ctx = Context::default();
    let starting_len = ctx.messages.len();
    let joined = join_stream(&mut stream, &mut ctx).await.unwrap();

    assert_eq!(joined.text, "Hello world");
    assert_eq!(ctx.messages.len(), starting_len + 1);
    assert_eq!(ctx.messages.last().unwrap().text(), "Hello world");
}
