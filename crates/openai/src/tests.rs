// Unit tests for the OpenAI transport against a mock HTTP server

use std::time::Duration;

use firstbyte_core::{ChatTransport, ProbeConfig, ProbeRequest, Prober, TransportError};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::{ChatRequest, MessageRole, OpenAiTransport};

const COMPLETIONS_PATH: &str = "/api/v3/chat/completions";

fn sse_body(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        let payload = json!({ "choices": [{ "delta": { "content": chunk } }] });
        body.push_str(&format!("data: {}\n\n", payload));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn sse_response(chunks: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(sse_body(chunks))
}

fn transport_for(server: &MockServer) -> OpenAiTransport {
    OpenAiTransport::with_base_url(format!("{}{}", server.uri(), COMPLETIONS_PATH))
        .expect("client should build")
}

fn request(timeout: Duration) -> ProbeRequest {
    ProbeRequest::new("doubao-lite", "你是谁？", "test-key", timeout)
}

#[test]
fn test_request_body_with_system_prompt() {
    let req = request(Duration::from_secs(5)).with_system_prompt("be brief");
    let body = ChatRequest::streaming(&req);

    assert_eq!(body.model, "doubao-lite");
    assert!(body.stream);
    assert_eq!(body.messages.len(), 2);
    assert_eq!(body.messages[0].role, MessageRole::System);
    assert_eq!(body.messages[0].content, "be brief");
    assert_eq!(body.messages[1].role, MessageRole::User);
    assert_eq!(body.messages[1].content, "你是谁？");
}

#[test]
fn test_request_body_without_system_prompt() {
    let body = ChatRequest::streaming(&request(Duration::from_secs(5)));
    let value = serde_json::to_value(&body).unwrap();

    assert_eq!(
        value,
        json!({
            "model": "doubao-lite",
            "messages": [{ "role": "user", "content": "你是谁？" }],
            "stream": true
        })
    );
}

#[test]
fn test_transport_with_config() {
    let config = ProbeConfig::default()
        .with_api_url("https://custom.api.com/v1/chat/completions")
        .with_connect_timeout(Duration::from_secs(2));
    let transport = OpenAiTransport::from_config(&config).unwrap();

    assert_eq!(transport.api_url(), "https://custom.api.com/v1/chat/completions");
    assert!(format!("{:?}", transport).contains("OpenAiTransport"));
}

#[test]
fn test_default_transport_targets_ark() {
    let transport = OpenAiTransport::new().unwrap();
    assert_eq!(transport.api_url(), firstbyte_core::config::DEFAULT_API_URL);
}

#[tokio::test]
async fn test_streamed_response_is_measured() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("firstbyte_openai=debug")
        .with_test_writer()
        .try_init();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .and(header("authorization", "Bearer test-key"))
        .and(header("content-type", "application/json"))
        .respond_with(sse_response(&["我是", "小智"]))
        .expect(1)
        .mount(&server)
        .await;

    let prober = Prober::new(transport_for(&server));
    let result = prober
        .probe(request(Duration::from_secs(5)).with_system_prompt("be brief"))
        .await;

    assert!(result.success(), "{:?}", result);
    assert_eq!(result.response_length(), 4);
    let first_byte = result.first_byte().expect("first byte recorded");
    assert!(result.total() >= first_byte);

    let received = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(sent["model"], "doubao-lite");
    assert_eq!(sent["stream"], true);
    assert_eq!(sent["messages"][0]["role"], "system");
    assert_eq!(sent["messages"][1]["content"], "你是谁？");
}

#[tokio::test]
async fn test_error_status_is_reported_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let err = transport
        .open_stream(&request(Duration::from_secs(5)))
        .await
        .err()
        .expect("401 should fail");
    assert_eq!(err, TransportError::status(401, "invalid api key"));

    let result = Prober::new(transport).probe(request(Duration::from_secs(5))).await;
    assert!(!result.success());
    assert_eq!(result.error(), Some("HTTP 401: invalid api key"));
    assert!(result.first_byte().is_none());
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(sse_response(&["late"]).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let result = Prober::new(transport_for(&server))
        .probe(request(Duration::from_millis(200)))
        .await;

    assert!(!result.success());
    assert_eq!(result.error(), Some("timeout"));
    assert!(result.total() >= Duration::from_millis(200));
    assert!(result.total() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_refused_connection_is_connect_error() {
    let transport = OpenAiTransport::with_base_url("http://127.0.0.1:1/v1/chat/completions").unwrap();

    let err = transport
        .open_stream(&request(Duration::from_secs(5)))
        .await
        .err()
        .expect("nothing listens on port 1");
    assert!(matches!(err, TransportError::Connect(_)), "{:?}", err);
}

#[tokio::test]
async fn test_stream_without_content_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(sse_response(&[]))
        .mount(&server)
        .await;

    let result = Prober::new(transport_for(&server))
        .probe(request(Duration::from_secs(5)))
        .await;

    assert!(!result.success());
    assert_eq!(result.error(), Some(firstbyte_core::probe::NO_CONTENT_ERROR));
}
