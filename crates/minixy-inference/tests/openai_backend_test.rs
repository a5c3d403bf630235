//! Integration tests for the OpenAI-compatible backend against a mock server.

#![cfg(feature = "openai")]

use minixy_core::{CleanedRow, EnrichError, Error, GenerationBackend, RowEnricher};
use minixy_inference::openai::{OpenAIBackend, OpenAIConfig};
use minixy_inference::{output_schema, LlmEnricher};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer, api_key: Option<&str>) -> OpenAIBackend {
    OpenAIBackend::new(OpenAIConfig {
        base_url: server.uri(),
        api_key: api_key.map(String::from),
        gen_model: "test-gen".to_string(),
        timeout_seconds: 5,
    })
    .expect("Failed to create backend")
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

#[tokio::test]
async fn test_structured_request_uses_strict_json_schema() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(json!({
            "model": "test-gen",
            "response_format": {
                "type": "json_schema",
                "json_schema": {"strict": true, "schema": output_schema()}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"country":"Spain","employee_size":"1-10","city":"Madrid","domain":"acme.es"}"#,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let enricher = LlmEnricher::new(backend(&mock_server, Some("test-key"))).unwrap();
    let enriched = enricher.enrich(&CleanedRow::default()).await.unwrap();
    assert_eq!(enriched.city, "Madrid");
    assert_eq!(enriched.domain, "acme.es");
}

#[tokio::test]
async fn test_no_auth_header_without_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("hi")))
        .mount(&mock_server)
        .await;

    backend(&mock_server, None)
        .generate_structured("", "hello", &output_schema())
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("authorization"));
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["temperature"], 0.0);
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["messages"][0]["role"], "user");
}

#[tokio::test]
async fn test_rate_limit_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {
                "message": "Rate limit reached for requests",
                "type": "requests",
                "code": "rate_limit_exceeded"
            }
        })))
        .mount(&mock_server)
        .await;

    let err = backend(&mock_server, Some("k"))
        .generate_structured("", "x", &output_schema())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RateLimited(ref m) if m.contains("Rate limit reached")));

    let enricher = LlmEnricher::new(backend(&mock_server, Some("k"))).unwrap();
    let err = enricher.enrich(&CleanedRow::default()).await.unwrap_err();
    assert!(matches!(err, EnrichError::RateLimited(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_non_json_error_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&mock_server)
        .await;

    let err = backend(&mock_server, None)
        .generate_structured("", "x", &output_schema())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Inference(ref m) if m.contains("bad gateway")));
}

#[tokio::test]
async fn test_refusal_is_schema_violation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": null, "refusal": "no"},
                "finish_reason": "stop"
            }]
        })))
        .mount(&mock_server)
        .await;

    let enricher = LlmEnricher::new(backend(&mock_server, None)).unwrap();
    let err = enricher.enrich(&CleanedRow::default()).await.unwrap_err();
    assert!(matches!(err, EnrichError::SchemaViolation(_)));
}
