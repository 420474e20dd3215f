//! Per-provider and aggregate response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::code::CodeBlock;
use super::execution::ExecutionResult;

/// A single provider's answer to an [`InferenceRequest`](super::request::InferenceRequest).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub model_name: String,
    pub provider: String,
    pub text: String,
    #[serde(default)]
    pub code_blocks: Vec<CodeBlock>,
    #[serde(default)]
    pub execution_results: Vec<ExecutionResult>,
    pub latency_s: f64,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl ModelResponse {
    pub fn errored(provider: impl Into<String>, model_name: impl Into<String>, error: impl Into<String>, latency_s: f64) -> Self {
        Self {
            model_name: model_name.into(),
            provider: provider.into(),
            text: String::new(),
            code_blocks: Vec::new(),
            execution_results: Vec::new(),
            latency_s,
            timestamp: Utc::now(),
            error: Some(error.into()),
        }
    }
}

/// The strategy by which [`InferenceResponse::selected_response`] was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStrategy {
    Consensus,
    HighConfidence,
    BestAvailable,
    Fallback,
    NoResponses,
}

impl SynthesisStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consensus => "consensus",
            Self::HighConfidence => "high_confidence",
            Self::BestAvailable => "best_available",
            Self::Fallback => "fallback",
            Self::NoResponses => "no_responses",
        }
    }
}

/// Summary of how a set of [`ModelResponse`]s was judged and reconciled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub verified: bool,
    pub consensus: bool,
    pub successful_executions: usize,
    pub total_executions: usize,
    pub synthesis_strategy: SynthesisStrategy,
    pub details: serde_json::Value,
}

/// Body returned by `POST /api/v1/inference`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub request_id: String,
    pub model_responses: Vec<ModelResponse>,
    pub verification: Option<VerificationReport>,
    pub selected_response: Option<ModelResponse>,
    pub total_latency_s: f64,
    pub timestamp: DateTime<Utc>,
}
