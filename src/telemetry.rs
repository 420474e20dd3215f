//! Telemetry metric name constants.
//!
//! Centralised metric names for the gateway. The `gatewayd` binary installs
//! a `metrics-exporter-prometheus` recorder and serves it at `/metrics`;
//! without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `gateway_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider` — provider name (e.g. "openai", "ollama")
//! - `operation` — capability invoked (e.g. "generate_completion", "health_check")
//! - `status` — outcome: "ok" or "error"
//! - `tier` — cache tier: "exact" or "semantic"
//! - `language` — sandboxed language: "python", "javascript", "bash"

/// Total inference requests received.
///
/// Labels: `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "gateway_requests_total";

/// End-to-end inference request duration in seconds.
pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";

/// Total provider calls dispatched by the orchestrator.
///
/// Labels: `provider`, `status`.
pub const PROVIDER_CALLS_TOTAL: &str = "gateway_provider_calls_total";

/// Provider call duration in seconds.
///
/// Labels: `provider`.
pub const PROVIDER_DURATION_SECONDS: &str = "gateway_provider_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "gateway_retries_total";

/// Total cache hits.
///
/// Labels: `tier` ("exact" | "semantic").
pub const CACHE_HITS_TOTAL: &str = "gateway_cache_hits_total";

/// Total cache misses.
///
/// Labels: `tier`.
pub const CACHE_MISSES_TOTAL: &str = "gateway_cache_misses_total";

/// Total sandboxed code executions.
///
/// Labels: `language`, `status`.
pub const SANDBOX_EXECUTIONS_TOTAL: &str = "gateway_sandbox_executions_total";

/// Sandbox execution duration in seconds.
///
/// Labels: `language`.
pub const SANDBOX_DURATION_SECONDS: &str = "gateway_sandbox_duration_seconds";

/// Total healing attempts.
///
/// Labels: `status` ("succeeded" | "failed").
pub const HEALING_ATTEMPTS_TOTAL: &str = "gateway_healing_attempts_total";

/// Total synthesis runs, by selected strategy.
///
/// Labels: `strategy`.
pub const SYNTHESIS_STRATEGY_TOTAL: &str = "gateway_synthesis_strategy_total";
