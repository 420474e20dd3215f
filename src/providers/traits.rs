//! The provider adapter contract.
//!
//! Every backend — OpenAI-style chat APIs, Google's generative API,
//! HuggingFace's raw text-completion endpoint, a local Ollama daemon — is
//! wrapped behind a single [`Provider`] trait. The orchestrator holds a
//! `Vec<Arc<dyn Provider>>` and fans a request out to all of them in
//! parallel rather than trying them in a fallback chain; a provider that
//! can't serve a request simply returns an error and is excluded from the
//! response set.

use async_trait::async_trait;

use crate::Result;

/// A single completion request sent to a provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Token accounting returned alongside a completion, when the provider
/// reports it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

/// A provider's answer to a [`CompletionRequest`].
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub model_name: String,
    pub usage: Usage,
}

/// Capability contract every backend adapter implements.
///
/// Implementors should be cheap to clone (`Arc`-wrapped internally) since
/// the orchestrator holds one instance per configured provider for the
/// lifetime of the process.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name used in logs, metrics labels, and `ModelResponse::provider`.
    fn provider_name(&self) -> &str;

    /// Generate a single completion for `request`.
    async fn generate_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse>;

    /// Lightweight liveness check, used by `GET /api/v1/health`.
    ///
    /// Default implementation issues a minimal completion request; adapters
    /// with a cheaper dedicated health endpoint should override this.
    async fn health_check(&self) -> Result<()> {
        let probe = CompletionRequest {
            prompt: "ping".to_string(),
            temperature: 0.0,
            max_tokens: 1,
        };
        self.generate_completion(&probe).await.map(|_| ())
    }
}
