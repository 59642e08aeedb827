//! HTTP-level tests for the chat client against a local mock server.

use nightwatch_llm::{ChatClient, CompletionModel, LlmError, LlmProvider};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn openai_parses_success_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": "{\"error_type\": \"TypeError\"}" }
            }]
        })))
        .mount(&server)
        .await;

    let client = ChatClient::new(LlmProvider::OpenAI, "sk-test".to_string(), None)
        .with_base_url(server.uri());

    let response = client
        .complete(Some("You are a CI failure analyst."), "diagnose this")
        .await
        .unwrap();
    assert_eq!(response, "{\"error_type\": \"TypeError\"}");
}

#[tokio::test]
async fn anthropic_parses_success_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "def test_fix():\n    pass" }]
        })))
        .mount(&server)
        .await;

    let client = ChatClient::new(LlmProvider::Anthropic, "sk-test".to_string(), None)
        .with_base_url(server.uri());

    let response = client.complete(None, "write a test").await.unwrap();
    assert!(response.starts_with("def test_fix"));
}

#[tokio::test]
async fn openai_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(LlmProvider::OpenAI, "sk-test".to_string(), None)
        .with_base_url(server.uri());

    match client.complete(None, "x").await {
        Err(LlmError::Api { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("bad request"));
        }
        other => panic!("expected Api error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn openai_retries_server_errors_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("flaky"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "recovered" } }]
        })))
        .mount(&server)
        .await;

    let client = ChatClient::new(LlmProvider::OpenAI, "sk-test".to_string(), None)
        .with_base_url(server.uri());

    let response = client.complete(None, "x").await.unwrap();
    assert_eq!(response, "recovered");
}
