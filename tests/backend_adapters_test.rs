use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sniff_recon::{build_backend, BackendDescriptor, BackendHandle, BackendKind, BackendTimeouts};

fn timeouts() -> BackendTimeouts {
    BackendTimeouts {
        health_check: Duration::from_secs(2),
        query: Duration::from_secs(2),
    }
}

fn backend(kind: BackendKind, server: &MockServer) -> BackendHandle {
    let descriptor = BackendDescriptor::new(kind, Some("test-key".to_string())).with_endpoint(server.uri());
    build_backend(&descriptor, timeouts()).unwrap()
}

// ========== Groq / OpenAI ==========

#[tokio::test]
async fn test_openai_compatible_query_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "llama-3.3-70b-versatile",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "  SYN scan detected  " },
                "finish_reason": "stop",
                "logprobs": null
            }],
            "usage": { "prompt_tokens": 40, "completion_tokens": 12, "total_tokens": 52 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let groq = backend(BackendKind::Groq, &server);
    let result = groq.query("what happened?", Some("Total Records: 3")).await;

    assert!(result.is_success(), "{:?}", result.error());
    assert_eq!(result.response(), "SYN scan detected");
    assert_eq!(result.tokens_used(), Some(52));
    assert_eq!(result.backend(), Some("Groq"));
    assert!(result.elapsed().is_some());
}

#[tokio::test]
async fn test_openai_compatible_auth_failure_is_failed_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "message": "Invalid API Key",
                "type": "invalid_request_error",
                "param": null,
                "code": "invalid_api_key"
            }
        })))
        .mount(&server)
        .await;

    let openai = backend(BackendKind::OpenAi, &server);
    let result = openai.query("q", None).await;

    assert!(!result.is_success());
    assert!(result.error().unwrap().contains("Invalid API Key"));
    assert_eq!(result.backend(), Some("OpenAI"));
}

#[tokio::test]
async fn test_openai_compatible_retryable_status_fails_after_one_request() {
    let cases = [
        (
            429u16,
            json!({ "error": { "message": "Rate limit reached", "type": "requests", "code": "rate_limit_exceeded" } }),
        ),
        (500, json!({ "error": { "message": "internal error", "type": "server_error" } })),
    ];

    for (status, body) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let started = std::time::Instant::now();
        let result = backend(BackendKind::Groq, &server).query("q", None).await;

        assert!(!result.is_success());
        let error = result.error().unwrap();
        assert!(error.starts_with(&format!("HTTP {}", status)), "{}", error);
        assert!(started.elapsed() < timeouts().query);
        server.verify().await;
    }
}

#[tokio::test]
async fn test_openai_compatible_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    assert!(backend(BackendKind::Groq, &server).health_check().await);
}

// ========== Anthropic ==========

#[tokio::test]
async fn test_anthropic_query_joins_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({ "model": "claude-3-sonnet-20240229", "max_tokens": 4096 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                { "type": "text", "text": "First finding." },
                { "type": "text", "text": "Second finding." }
            ],
            "usage": { "input_tokens": 100, "output_tokens": 20 }
        })))
        .mount(&server)
        .await;

    let anthropic = backend(BackendKind::Anthropic, &server);
    let result = anthropic.query("q", Some("ctx")).await;

    assert!(result.is_success());
    assert_eq!(result.response(), "First finding.\nSecond finding.");
    assert_eq!(result.tokens_used(), Some(120));
}

#[tokio::test]
async fn test_anthropic_server_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded_error"))
        .mount(&server)
        .await;

    let anthropic = backend(BackendKind::Anthropic, &server);
    assert!(!anthropic.health_check().await);

    let result = anthropic.query("q", None).await;
    assert!(!result.is_success());
    assert_eq!(result.error(), Some("HTTP 529: overloaded_error"));
}

// ========== Gemini ==========

#[tokio::test]
async fn test_gemini_query_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({ "generationConfig": { "maxOutputTokens": 8192 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "DNS tunnelling suspected" }] }
            }],
            "usageMetadata": { "totalTokenCount": 77 }
        })))
        .mount(&server)
        .await;

    let gemini = backend(BackendKind::Gemini, &server);
    let result = gemini.query("q", None).await;

    assert!(result.is_success());
    assert_eq!(result.response(), "DNS tunnelling suspected");
    assert_eq!(result.tokens_used(), Some(77));
    assert_eq!(result.backend(), Some("Google Gemini"));
}

#[tokio::test]
async fn test_gemini_quota_error_is_failed_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED: quota exceeded"))
        .mount(&server)
        .await;

    let result = backend(BackendKind::Gemini, &server).query("q", None).await;
    assert!(!result.is_success());
    assert!(result.error().unwrap().starts_with("HTTP 429"));
}

#[tokio::test]
async fn test_gemini_blocked_prompt_is_failed_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [],
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let result = backend(BackendKind::Gemini, &server).query("q", None).await;
    assert!(!result.is_success());
    assert!(result.error().unwrap().contains("SAFETY"));
}

// ========== Ollama ==========

fn ollama(server: &MockServer) -> BackendHandle {
    let descriptor = BackendDescriptor::new(BackendKind::Ollama, None).with_endpoint(server.uri());
    build_backend(&descriptor, timeouts()).unwrap()
}

#[tokio::test]
async fn test_ollama_query_and_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({ "model": "llama3", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3",
            "response": "Mostly HTTPS traffic.",
            "done": true,
            "prompt_eval_count": 30,
            "eval_count": 9
        })))
        .mount(&server)
        .await;

    let local = ollama(&server);
    assert!(local.health_check().await);

    let result = local.query("q", Some("ctx")).await;
    assert!(result.is_success());
    assert_eq!(result.response(), "Mostly HTTPS traffic.");
    assert_eq!(result.tokens_used(), Some(39));
}

#[tokio::test]
async fn test_ollama_empty_response_is_failed_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "   ", "done": true })))
        .mount(&server)
        .await;

    let result = ollama(&server).query("q", None).await;
    assert!(!result.is_success());
    assert_eq!(result.error(), Some("empty response content"));
}

#[tokio::test]
async fn test_ollama_timeout_is_failed_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": "too late" }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let result = ollama(&server).query("q", None).await;
    assert!(!result.is_success());
    assert!(result.error().unwrap().contains("timed out"), "{:?}", result.error());
}

#[tokio::test]
async fn test_unreachable_backend_is_unhealthy() {
    let descriptor =
        BackendDescriptor::new(BackendKind::Ollama, None).with_endpoint("http://127.0.0.1:9");
    let local = build_backend(&descriptor, timeouts()).unwrap();

    assert!(!local.health_check().await);
    let result = local.query("q", None).await;
    assert!(!result.is_success());
    assert!(result.error().unwrap().starts_with("request failed"));
}

#[test]
fn test_cloud_backend_requires_key() {
    let descriptor = BackendDescriptor::new(BackendKind::Anthropic, None);
    assert!(build_backend(&descriptor, timeouts()).is_err());
}
