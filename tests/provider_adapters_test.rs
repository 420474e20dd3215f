//! Wiremock integration tests for the provider adapters.
//!
//! Each adapter speaks a different wire dialect; these tests pin down the
//! request shape each one sends and the error mapping for non-2xx
//! responses.

use heimdall_gateway::providers::traits::{CompletionRequest, Provider};
use heimdall_gateway::providers::{GoogleProvider, HuggingFaceProvider, OllamaProvider, OpenAiCompatibleProvider};
use heimdall_gateway::GatewayError;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(prompt: &str) -> CompletionRequest {
    CompletionRequest {
        prompt: prompt.to_string(),
        temperature: 0.7,
        max_tokens: 256,
    }
}

#[tokio::test]
async fn openai_compatible_success() {
    let mock_server = MockServer::start().await;

    let body = serde_json::json!({
        "choices": [{ "message": { "content": "4" } }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 1 },
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&mock_server)
        .await;

    let provider = OpenAiCompatibleProvider::named("openai", "test-key", "gpt-4o-mini", mock_server.uri());
    let response = provider.generate_completion(&request("2+2")).await.unwrap();

    assert_eq!(response.text, "4");
    assert_eq!(response.usage.prompt_tokens, Some(10));
}

#[tokio::test]
async fn openai_compatible_401_maps_to_authentication_failed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let provider = OpenAiCompatibleProvider::named("openai", "bad-key", "gpt-4o-mini", mock_server.uri());
    let result = provider.generate_completion(&request("hi")).await;

    assert!(matches!(result, Err(GatewayError::AuthenticationFailed)));
}

#[tokio::test]
async fn openai_compatible_429_carries_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
        .mount(&mock_server)
        .await;

    let provider = OpenAiCompatibleProvider::named("groq", "test-key", "llama-3.1", mock_server.uri());
    let result = provider.generate_completion(&request("hi")).await;

    match result {
        Err(GatewayError::RateLimited { retry_after }) => {
            assert_eq!(retry_after, Some(std::time::Duration::from_secs(12)));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn google_provider_success() {
    let mock_server = MockServer::start().await;

    let body = serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": "4" }] } }],
        "usageMetadata": { "promptTokenCount": 5, "candidatesTokenCount": 1 },
    });

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&mock_server)
        .await;

    let provider = GoogleProvider::with_base_url("test-key", "gemini-1.5-flash", mock_server.uri());
    let response = provider.generate_completion(&request("2+2")).await.unwrap();

    assert_eq!(response.text, "4");
    assert_eq!(response.usage.completion_tokens, Some(1));
}

#[tokio::test]
async fn google_provider_403_maps_to_authentication_failed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let provider = GoogleProvider::with_base_url("bad-key", "gemini-1.5-flash", mock_server.uri());
    let result = provider.generate_completion(&request("hi")).await;

    assert!(matches!(result, Err(GatewayError::AuthenticationFailed)));
}

#[tokio::test]
async fn huggingface_provider_success() {
    let mock_server = MockServer::start().await;
    let model = "meta-llama/Llama-3.1-8B-Instruct";

    let body = serde_json::json!([{ "generated_text": "4" }]);

    Mock::given(method("POST"))
        .and(path(format!("/models/{model}")))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&mock_server)
        .await;

    let provider = HuggingFaceProvider::with_base_url("test-key", model, mock_server.uri());
    let response = provider.generate_completion(&request("2+2")).await.unwrap();

    assert_eq!(response.text, "4");
}

#[tokio::test]
async fn huggingface_provider_503_is_model_loading() {
    let mock_server = MockServer::start().await;
    let model = "meta-llama/Llama-3.1-8B-Instruct";

    Mock::given(method("POST"))
        .and(path(format!("/models/{model}")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let provider = HuggingFaceProvider::with_base_url("test-key", model, mock_server.uri());
    let result = provider.generate_completion(&request("hi")).await;

    match result {
        Err(GatewayError::Provider { message, .. }) => assert!(message.contains("loading")),
        other => panic!("expected Provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn ollama_provider_success() {
    let mock_server = MockServer::start().await;

    let body = serde_json::json!({
        "response": "4",
        "prompt_eval_count": 8,
        "eval_count": 1,
    });

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::with_base_url("llama3", mock_server.uri());
    let response = provider.generate_completion(&request("2+2")).await.unwrap();

    assert_eq!(response.text, "4");
    assert_eq!(response.usage.prompt_tokens, Some(8));
}

#[tokio::test]
async fn ollama_provider_daemon_unreachable_is_provider_error() {
    // Nothing is listening on this port.
    let provider = OllamaProvider::with_base_url("llama3", "http://127.0.0.1:1");
    let result = provider.generate_completion(&request("hi")).await;

    assert!(matches!(result, Err(GatewayError::Provider { .. })));
}

#[tokio::test]
async fn ollama_health_check_reflects_daemon_reachability() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::with_base_url("llama3", mock_server.uri());
    assert!(provider.health_check().await.is_ok());
}
