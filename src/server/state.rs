//! Shared state injected into every HTTP handler.

use std::collections::HashMap;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::cache::SemanticCache;
use crate::orchestrator::Orchestrator;
use crate::providers::traits::Provider;
use crate::sandbox::SandboxExecutor;

/// Everything a request handler needs, constructed once at startup and
/// cloned cheaply (every field is `Arc`-backed) into each request.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub sandbox: Arc<SandboxExecutor>,
    pub cache: Arc<SemanticCache>,
    /// Providers keyed by name, for the healer's reflexion calls and the
    /// health-check endpoint. Kept separately from the orchestrator's
    /// registry so the healer doesn't need to reach through it.
    pub providers: Vec<Arc<dyn Provider>>,
    /// Resolved model name per provider, for `GET /api/v1/models`.
    pub models: HashMap<String, String>,
    /// Compared against the caller's `X-API-Key` header. `None` means no
    /// key was configured, which fails every authenticated request closed
    /// rather than leaving the gateway open.
    pub gateway_api_key: Option<String>,
    /// Handle to the Prometheus recorder installed at binary startup, used
    /// to render `GET /metrics`.
    pub prometheus_handle: PrometheusHandle,
}
