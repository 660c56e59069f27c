//! OpenAiChatClient against a local mock endpoint.

use mockito::Matcher;
use proofbench_llm::{ChatClient, ChatError, ChatRequest, EndpointConfig, OpenAiChatClient};

fn client_for(server: &mockito::ServerGuard, key: Option<&str>) -> OpenAiChatClient {
    let mut config = EndpointConfig::default()
        .with_base_url(&server.url())
        .with_model("bench-model")
        .with_timeout_secs(5);
    if let Some(key) = key {
        config = config.with_api_key(key);
    }
    OpenAiChatClient::new(config).expect("configured client")
}

#[tokio::test]
async fn sends_bearer_token_and_reads_choice_content() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "bench-model",
            "messages": [{"role": "user", "content": "capital of France?"}],
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":" Paris "}}]}"#)
        .create_async()
        .await;

    let client = client_for(&server, Some("sk-test"));
    let resp = client
        .chat(&ChatRequest::new("capital of France?"))
        .await
        .expect("chat succeeds");

    assert_eq!(resp.text, "Paris");
    assert_eq!(client.model(), "bench-model");
    assert!(client.endpoint().ends_with("/chat/completions"));
    mock.assert_async().await;
}

#[tokio::test]
async fn falls_back_to_output_field() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(r#"{"output":"42"}"#)
        .create_async()
        .await;

    let client = client_for(&server, None);
    let resp = client.chat(&ChatRequest::new("q")).await.expect("chat");
    assert_eq!(resp.text, "42");
}

#[tokio::test]
async fn non_success_status_is_transport_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body("overloaded")
        .create_async()
        .await;

    let client = client_for(&server, None);
    let err = client.chat(&ChatRequest::new("q")).await.unwrap_err();
    match err {
        ChatError::Status { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_payload_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let client = client_for(&server, None);
    let err = client.chat(&ChatRequest::new("q")).await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidPayload(_)));
}
