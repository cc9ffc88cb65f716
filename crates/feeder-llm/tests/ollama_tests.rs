use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use feeder_core::config::LlmSettings;
use feeder_llm::{Generator, LlmError, OllamaClient, EMPTY_RESPONSE, ERROR_RESPONSE};

fn client_for(endpoint: String) -> OllamaClient {
    OllamaClient::new(&LlmSettings { endpoint, model: "llama2".into(), timeout_secs: 5 }).expect("client")
}

#[tokio::test]
async fn streamed_fragments_are_concatenated_in_order() {
    let server = MockServer::start().await;
    let body = [
        r#"{"model":"llama2","response":"The ","done":false}"#,
        r#"{"model":"llama2","response":"answer ","done":false}"#,
        r#"{"model":"llama2","response":"is 42.","done":false}"#,
        r#"{"model":"llama2","response":"","done":true}"#,
    ]
    .join("\n");
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(json!({"model": "llama2", "prompt": "what is it?"})))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let client = client_for(format!("{}/api/generate", server.uri()));
    assert_eq!(client.generate("what is it?").await, "The answer is 42.");
}

#[tokio::test]
async fn single_json_object_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"model": "llama2", "response": "  whole reply\n", "done": true})))
        .mount(&server)
        .await;

    let client = client_for(format!("{}/api/generate", server.uri()));
    assert_eq!(client.generate("q").await, "whole reply");
}

#[tokio::test]
async fn malformed_lines_are_skipped() {
    let server = MockServer::start().await;
    let body = "{\"response\":\"kept \"}\nthis is not json {{{\n{\"response\":\"too\"}\n";
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let client = client_for(format!("{}/api/generate", server.uri()));
    assert_eq!(client.generate("q").await, "kept too");
}

#[tokio::test]
async fn empty_reply_uses_fallback_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"done\":true}\n"))
        .mount(&server)
        .await;

    let client = client_for(format!("{}/api/generate", server.uri()));
    assert_eq!(client.generate("q").await, EMPTY_RESPONSE);
}

#[tokio::test]
async fn http_error_status_yields_error_string() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(format!("{}/api/generate", server.uri()));
    assert!(matches!(client.try_generate("q").await, Err(LlmError::Status { .. })));
    assert_eq!(client.generate("q").await, ERROR_RESPONSE);
}

#[tokio::test]
async fn unreachable_backend_yields_error_string() {
    // bind then release a port so nothing is listening on it
    let port = std::net::TcpListener::bind("127.0.0.1:0").expect("bind").local_addr().expect("addr").port();
    let endpoint = format!("http://127.0.0.1:{port}/api/generate");

    let client = client_for(endpoint);
    assert!(matches!(client.try_generate("q").await, Err(LlmError::Http(_))));
    assert_eq!(client.generate("q").await, ERROR_RESPONSE);
}

#[tokio::test]
async fn model_override_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({"model": "mistral", "prompt": "hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"response\":\"ok\"}"))
        .mount(&server)
        .await;

    let client = client_for(format!("{}/api/generate", server.uri())).with_model("mistral");
    assert_eq!(client.model(), "mistral");
    assert_eq!(client.generate("hi").await, "ok");
}
