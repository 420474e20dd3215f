//! `X-API-Key` authentication middleware.
//!
//! Comparison is constant-time (`subtle::ConstantTimeEq`) so response
//! timing doesn't leak how many leading bytes of a guessed key matched.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use super::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";

/// Rejects the request with 401 unless `X-API-Key` equals the configured
/// gateway key. A gateway with no key configured rejects everything —
/// fail closed, not open.
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.gateway_api_key.as_deref() else {
        return (StatusCode::UNAUTHORIZED, "gateway API key not configured").into_response();
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if bool::from(key.as_bytes().ct_eq(expected.as_bytes())) => next.run(request).await,
        _ => (StatusCode::UNAUTHORIZED, "invalid or missing X-API-Key").into_response(),
    }
}
