//! Exercises the live HTTP transport path (reqwest POST + SSE byte stream)
//! against a mocked endpoint, rather than fixture replay.

mod init_logging;

use llmkit::{generate_text, CompletionOptions};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn generate_text_drives_a_real_sse_response_through_the_wire_decoder() {
    let server = MockServer::start().await;

    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2,\"total_tokens\":5}}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let opts = CompletionOptions {
        api_key: Some("fake-key".to_string()),
        base_url: Some(server.uri()),
        ..Default::default()
    };

    let response = generate_text("openai:gpt-4o-mini", "Hello!", opts).await.unwrap();

    assert_eq!(response.text, "Hello world");
    assert_eq!(response.usage.unwrap().total, 5);
}

#[tokio::test]
async fn api_error_status_surfaces_as_a_transport_error_chunk() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":{"message":"invalid api key"}}"#))
        .mount(&server)
        .await;

    let opts = CompletionOptions {
        api_key: Some("fake-key".to_string()),
        base_url: Some(server.uri()),
        ..Default::default()
    };

    let mut stream = llmkit::stream_text("openai:gpt-4o-mini", "Hello!", opts).await.unwrap();
    let first = stream.next().await.unwrap();
    assert!(first.is_err());
}
