//! Inference request types.

use serde::{Deserialize, Serialize};

/// Sandbox resource bounds for a single inference request.
///
/// Mirrors the `CodeExecutionConfig` shape accepted by the HTTP API —
/// every field has a sensible default so a bare `{}` in the request body
/// is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionConfig {
    /// Execution timeout in seconds. Default: 30.
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
    /// Memory limit, e.g. `"256m"` or `"1g"`. Default: `"256m"`.
    #[serde(default = "default_memory_limit")]
    pub memory_limit: String,
    /// CPU limit as a fraction of a core. Default: 0.5.
    #[serde(default = "default_cpu_fraction")]
    pub cpu_fraction: f64,
    /// Whether to disable network access inside the sandbox. Default: true.
    #[serde(default = "default_network_disabled")]
    pub network_disabled: bool,
}

fn default_timeout_s() -> u64 {
    30
}

fn default_memory_limit() -> String {
    "256m".to_string()
}

fn default_cpu_fraction() -> f64 {
    0.5
}

fn default_network_disabled() -> bool {
    true
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_s: default_timeout_s(),
            memory_limit: default_memory_limit(),
            cpu_fraction: default_cpu_fraction(),
            network_disabled: default_network_disabled(),
        }
    }
}

/// Body of `POST /api/v1/inference`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// The prompt to send to every configured provider.
    pub prompt: String,
    /// Whether to extract and execute code blocks from each response.
    #[serde(default = "default_true")]
    pub execute_code: bool,
    /// Whether to run verification/synthesis over the responses.
    #[serde(default = "default_true")]
    pub verify: bool,
    /// Sampling temperature, clamped to `[0, 2]` by [`InferenceRequest::validate`].
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate, per provider.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Sandbox resource bounds.
    #[serde(default)]
    pub execution_config: ExecutionConfig,
}

fn default_true() -> bool {
    true
}

fn default_temperature() -> f32 {
    0.7
}

impl InferenceRequest {
    /// Clamp temperature into `[0, 2]` as required by the invariant in the
    /// data model; out-of-range client input is corrected rather than rejected.
    pub fn validate(mut self) -> Self {
        self.temperature = self.temperature.clamp(0.0, 2.0);
        self
    }
}
