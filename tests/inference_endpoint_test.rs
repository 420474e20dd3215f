//! End-to-end tests over the `/api/v1/inference` handler, exercising the
//! orchestrator → sandbox → synthesizer pipeline through the real HTTP
//! router with stub providers standing in for network calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use heimdall_gateway::cache::{CacheConfig, SemanticCache};
use heimdall_gateway::providers::registry::ProviderRegistry;
use heimdall_gateway::providers::traits::{CompletionRequest, CompletionResponse, Provider, Usage};
use heimdall_gateway::providers::TokenBucket;
use heimdall_gateway::sandbox::SandboxExecutor;
use heimdall_gateway::server::{build_router, AppState};
use heimdall_gateway::{GatewayError, Orchestrator, Result};
use serde_json::{json, Value};
use tower::ServiceExt;

struct EchoCodeProvider {
    name: &'static str,
    reply: &'static str,
}

#[async_trait]
impl Provider for EchoCodeProvider {
    fn provider_name(&self) -> &str {
        self.name
    }

    async fn generate_completion(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            text: self.reply.to_string(),
            model_name: format!("{}-model", self.name),
            usage: Usage::default(),
        })
    }
}

struct BrokenAuthProvider {
    name: &'static str,
}

#[async_trait]
impl Provider for BrokenAuthProvider {
    fn provider_name(&self) -> &str {
        self.name
    }

    async fn generate_completion(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        Err(GatewayError::AuthenticationFailed)
    }
}

fn fast_limiters(names: &[&str]) -> HashMap<String, Arc<TokenBucket>> {
    names
        .iter()
        .map(|n| (n.to_string(), Arc::new(TokenBucket::new(1000.0, Duration::from_secs(1)))))
        .collect()
}

fn no_semantic_cache() -> Arc<SemanticCache> {
    Arc::new(SemanticCache::with_backends(
        Arc::new(heimdall_gateway::cache::store::InMemoryStore::new(100, Duration::from_secs(60))),
        None,
        0.95,
        Duration::from_secs(60),
    ))
}

fn state_for(providers: Vec<Arc<dyn Provider>>) -> AppState {
    let mut registry = ProviderRegistry::new();
    let mut names = Vec::new();
    for provider in &providers {
        names.push(provider.provider_name().to_string());
        registry.add(provider.clone());
    }

    let cache = no_semantic_cache();
    let orchestrator = Arc::new(Orchestrator::new(
        registry,
        fast_limiters(&names.iter().map(String::as_str).collect::<Vec<_>>()),
        cache.clone(),
        Duration::from_secs(5),
    ));

    AppState {
        orchestrator,
        sandbox: Arc::new(SandboxExecutor::subprocess()),
        cache,
        providers,
        models: HashMap::new(),
        gateway_api_key: Some("test-key".to_string()),
        prometheus_handle: metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle(),
    }
}

async fn post_inference(state: AppState, body: Value) -> (StatusCode, Value) {
    let app = build_router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/inference")
                .header("content-type", "application/json")
                .header("x-api-key", "test-key")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, parsed)
}

/// S1: a prompt whose code executes cleanly should be picked by the
/// synthesizer with a high-confidence or consensus strategy.
#[tokio::test]
async fn happy_path_executes_and_verifies() {
    let providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(EchoCodeProvider { name: "a", reply: "```python\nprint(2 + 2)\n```" }),
        Arc::new(EchoCodeProvider { name: "b", reply: "```python\nprint(2 + 2)\n```" }),
    ];
    let state = state_for(providers);

    let (status, body) = post_inference(
        state,
        json!({ "prompt": "Return 2+2", "execute_code": true, "verify": true }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let strategy = body["verification"]["synthesis_strategy"].as_str().unwrap();
    assert!(matches!(strategy, "consensus" | "high_confidence"));
    let stdout = body["selected_response"]["execution_results"][0]["stdout"].as_str().unwrap();
    assert_eq!(stdout.trim(), "4");
}

/// S4: one provider failing outright must not take down the whole request.
#[tokio::test]
async fn partial_provider_failure_still_returns_200() {
    let providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(BrokenAuthProvider { name: "bad" }),
        Arc::new(EchoCodeProvider { name: "good", reply: "```python\nprint(1)\n```" }),
    ];
    let state = state_for(providers);

    let (status, body) = post_inference(state, json!({ "prompt": "hi" })).await;

    assert_eq!(status, StatusCode::OK);
    let responses = body["model_responses"].as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert!(responses.iter().any(|r| !r["error"].is_null()));
    assert!(responses.iter().any(|r| r["error"].is_null()));
}

/// S5: every provider failing yields 503, not a generic 500.
#[tokio::test]
async fn all_providers_failing_returns_503() {
    let providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(BrokenAuthProvider { name: "a" }),
        Arc::new(BrokenAuthProvider { name: "b" }),
    ];
    let state = state_for(providers);

    let (status, body) = post_inference(state, json!({ "prompt": "hi" })).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"].as_str(), Some("All LLM providers failed"));
}

/// S6: an unsupported fenced language is dropped silently, not surfaced as
/// an error.
#[tokio::test]
async fn unsupported_language_block_is_dropped_without_error() {
    let providers: Vec<Arc<dyn Provider>> = vec![Arc::new(EchoCodeProvider {
        name: "a",
        reply: "```rust\nfn main() {}\n```",
    })];
    let state = state_for(providers);

    let (status, body) = post_inference(state, json!({ "prompt": "hi", "execute_code": true })).await;

    assert_eq!(status, StatusCode::OK);
    let response = &body["model_responses"][0];
    assert!(response["error"].is_null());
    assert_eq!(response["execution_results"].as_array().unwrap().len(), 0);
}

/// Missing/invalid `X-API-Key` on a protected route is rejected before the
/// orchestrator ever runs.
#[tokio::test]
async fn missing_api_key_is_rejected() {
    let state = state_for(vec![]);
    let app = build_router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/inference")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "prompt": "hi" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
