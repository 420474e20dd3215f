//! HTTP route handlers for the inference gateway.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{middleware, Router};
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use super::auth::require_api_key;
use super::state::AppState;
use crate::extractor;
use crate::healer;
use crate::synthesizer;
use crate::types::{CodeBlock, ExecutionResult, InferenceRequest, InferenceResponse, ModelResponse};

/// Build the full router: public routes, `X-API-Key`-gated routes, and a
/// `/metrics` endpoint served by whatever Prometheus recorder the binary
/// installed globally before constructing this router.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/inference", post(inference_handler))
        .route("/api/v1/cache/clear", post(cache_clear_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let public = Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/models", get(models_handler))
        .route("/api/v1/cache/stats", get(cache_stats_handler))
        .route("/metrics", get(metrics_handler));

    Router::new().merge(protected).merge(public).with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

async fn inference_handler(
    State(state): State<AppState>,
    Json(request): Json<InferenceRequest>,
) -> Response {
    let start = std::time::Instant::now();
    let request = request.validate();

    let mut model_responses = state
        .orchestrator
        .run_inference(&request.prompt, request.temperature, request.max_tokens)
        .await;

    if request.execute_code {
        let limits = execution_limits_for(&request, &state);
        execute_code_in_all(&mut model_responses, &state, &limits).await;
        healer::heal_all(&mut model_responses, &state.providers, &state.sandbox, &limits).await;
    }

    let all_failed = !model_responses.iter().any(|r| r.error.is_none());
    if all_failed {
        warn!("all providers failed for this request");
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "All LLM providers failed");
    }

    let (selected_response, verification) = if request.verify {
        let (selected, report) = synthesizer::synthesize(&model_responses, true);
        (selected, Some(report))
    } else {
        (None, None)
    };

    let response = InferenceResponse {
        request_id: uuid::Uuid::new_v4().to_string(),
        model_responses,
        verification,
        selected_response,
        total_latency_s: start.elapsed().as_secs_f64(),
        timestamp: Utc::now(),
    };

    Json(response).into_response()
}

/// Per-request sandbox limits always come from the request body — every
/// field in `ExecutionConfig` has a serde default, so `state` is unused
/// here but kept in the signature for symmetry with the rest of the
/// pipeline, which is all state-threaded.
fn execution_limits_for(request: &InferenceRequest, _state: &AppState) -> crate::sandbox::ExecutionLimits {
    crate::sandbox::ExecutionLimits {
        timeout: std::time::Duration::from_secs(request.execution_config.timeout_s),
        memory_limit_bytes: crate::sandbox::parse_memory_limit(&request.execution_config.memory_limit),
        nano_cpus: crate::sandbox::cpu_fraction_to_nano_cpus(request.execution_config.cpu_fraction),
        network_disabled: request.execution_config.network_disabled,
    }
}

async fn execute_code_in_all(
    responses: &mut [ModelResponse],
    state: &AppState,
    limits: &crate::sandbox::ExecutionLimits,
) {
    let futures = responses.iter_mut().map(|response| {
        let sandbox = state.sandbox.clone();
        let limits = limits.clone();
        async move {
            let blocks = extractor::filter_executable_blocks(extractor::extract_code_blocks(&response.text));
            let results = execute_blocks(&blocks, &sandbox, &limits).await;
            response.code_blocks = blocks;
            response.execution_results = results;
        }
    });
    join_all(futures).await;
}

async fn execute_blocks(
    blocks: &[CodeBlock],
    sandbox: &crate::sandbox::SandboxExecutor,
    limits: &crate::sandbox::ExecutionLimits,
) -> Vec<ExecutionResult> {
    let futures = blocks.iter().map(|block| async move {
        if let Err(reason) = extractor::validate_syntax(block) {
            return ExecutionResult {
                success: false,
                exit_code: Some(-1),
                stdout: String::new(),
                stderr: reason.clone(),
                execution_time_s: 0.0,
                error: Some(reason),
                healed: false,
            };
        }
        sandbox.execute_code(block, limits).await
    });
    join_all(futures).await
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let checks = state.providers.iter().map(|p| async move {
        (p.provider_name().to_string(), p.health_check().await.is_ok())
    });
    let results: HashMap<String, bool> = join_all(checks).await.into_iter().collect();

    let all_healthy = !results.is_empty() && results.values().all(|ok| *ok);
    let status = if all_healthy { "ok" } else { "degraded" };
    let body = json!({
        "status": status,
        "providers": results,
        "models": state.models,
    });

    if all_healthy {
        Json(body).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

async fn models_handler(State(state): State<AppState>) -> Response {
    Json(json!({ "models": state.models })).into_response()
}

async fn cache_stats_handler(State(state): State<AppState>) -> Response {
    Json(state.cache.stats()).into_response()
}

async fn cache_clear_handler(State(state): State<AppState>) -> Response {
    state.cache.clear(None).await;
    Json(json!({ "cleared": true })).into_response()
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    state.prometheus_handle.render().into_response()
}
