//! Parallel fan-out to every configured provider.
//!
//! [`Orchestrator::run_inference`] is the entry point the HTTP layer calls.
//! Each provider gets an independent `tokio::spawn`ed unit of work — rate
//! limit, cache check, timed provider call, best-effort cache write — and
//! the orchestrator waits for every unit regardless of individual outcome,
//! preserving provider-registration order in the result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use tracing::warn;

use crate::cache::SemanticCache;
use crate::providers::rate_limit::TokenBucket;
use crate::providers::registry::ProviderRegistry;
use crate::providers::traits::{CompletionRequest, Provider};
use crate::telemetry;
use crate::types::ModelResponse;

const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Wiring for a single fan-out: the provider set, their rate limiters, the
/// shared cache, and the per-call deadline.
pub struct Orchestrator {
    providers: ProviderRegistry,
    rate_limiters: HashMap<String, Arc<TokenBucket>>,
    default_rate_limiter: Arc<TokenBucket>,
    cache: Arc<SemanticCache>,
    request_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        providers: ProviderRegistry,
        rate_limiters: HashMap<String, Arc<TokenBucket>>,
        cache: Arc<SemanticCache>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            providers,
            rate_limiters,
            default_rate_limiter: Arc::new(TokenBucket::new(60.0, Duration::from_secs(60))),
            cache,
            request_timeout,
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    fn rate_limiter_for(&self, provider_name: &str) -> Arc<TokenBucket> {
        self.rate_limiters
            .get(provider_name)
            .cloned()
            .unwrap_or_else(|| self.default_rate_limiter.clone())
    }

    /// Fan `prompt` out to every configured provider in parallel.
    ///
    /// The returned vector always has one entry per configured provider,
    /// in registration order, regardless of which provider answered first.
    pub async fn run_inference(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Vec<ModelResponse> {
        let max_tokens = max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);

        let tasks = self.providers.iter().map(|provider| {
            let provider = provider.clone();
            let rate_limiter = self.rate_limiter_for(provider.provider_name());
            let cache = self.cache.clone();
            let prompt = prompt.to_string();
            let timeout = self.request_timeout;

            tokio::spawn(async move {
                run_one(provider, rate_limiter, cache, prompt, temperature, max_tokens, timeout).await
            })
        });

        join_all(tasks)
            .await
            .into_iter()
            .enumerate()
            .map(|(i, joined)| match joined {
                Ok(response) => response,
                Err(e) => {
                    let provider_name = self
                        .providers
                        .iter()
                        .nth(i)
                        .map(|p| p.provider_name().to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    warn!(provider = provider_name, error = %e, "provider task panicked");
                    ModelResponse::errored(provider_name, "unknown", format!("task panicked: {e}"), 0.0)
                }
            })
            .collect()
    }
}

async fn run_one(
    provider: Arc<dyn Provider>,
    rate_limiter: Arc<TokenBucket>,
    cache: Arc<SemanticCache>,
    prompt: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
) -> ModelResponse {
    let provider_name = provider.provider_name().to_string();

    if let Some(cached) = cache.get(&prompt, &provider_name).await {
        if let Ok(mut response) = serde_json::from_str::<ModelResponse>(&cached) {
            response.latency_s = 0.0;
            response.timestamp = Utc::now();
            return response;
        }
    }

    rate_limiter.acquire().await;

    let start = Instant::now();
    let call = provider.generate_completion(&CompletionRequest {
        prompt: prompt.clone(),
        temperature,
        max_tokens,
    });

    let outcome = tokio::time::timeout(timeout, call).await;
    let latency_s = start.elapsed().as_secs_f64();

    metrics::histogram!(telemetry::PROVIDER_DURATION_SECONDS, "provider" => provider_name.clone())
        .record(latency_s);

    let response = match outcome {
        Ok(Ok(completion)) => {
            metrics::counter!(telemetry::PROVIDER_CALLS_TOTAL,
                "provider" => provider_name.clone(), "status" => "ok")
                .increment(1);
            ModelResponse {
                model_name: completion.model_name,
                provider: provider_name.clone(),
                text: completion.text,
                code_blocks: Vec::new(),
                execution_results: Vec::new(),
                latency_s,
                timestamp: Utc::now(),
                error: None,
            }
        }
        Ok(Err(e)) => {
            metrics::counter!(telemetry::PROVIDER_CALLS_TOTAL,
                "provider" => provider_name.clone(), "status" => "error")
                .increment(1);
            ModelResponse::errored(provider_name.clone(), provider_name.clone(), e.to_string(), latency_s)
        }
        Err(_) => {
            metrics::counter!(telemetry::PROVIDER_CALLS_TOTAL,
                "provider" => provider_name.clone(), "status" => "error")
                .increment(1);
            ModelResponse::errored(
                provider_name.clone(),
                provider_name.clone(),
                format!("request timed out after {}s", timeout.as_secs()),
                latency_s,
            )
        }
    };

    if response.error.is_none() {
        if let Ok(serialized) = serde_json::to_string(&response) {
            let cache = cache.clone();
            let prompt = prompt.clone();
            let provider_name = provider_name.clone();
            tokio::spawn(async move {
                cache.set(&prompt, &provider_name, &serialized).await;
            });
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, SemanticCache};
    use crate::providers::traits::{CompletionResponse, Usage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubProvider {
        name: &'static str,
        delay: Duration,
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn provider_name(&self) -> &str {
            self.name
        }

        async fn generate_completion(&self, request: &CompletionRequest) -> crate::Result<CompletionResponse> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(CompletionResponse {
                text: format!("echo: {}", request.prompt),
                model_name: format!("{}-model", self.name),
                usage: Usage::default(),
            })
        }
    }

    struct FailingProvider {
        name: &'static str,
    }

    #[async_trait]
    impl Provider for FailingProvider {
        fn provider_name(&self) -> &str {
            self.name
        }

        async fn generate_completion(&self, _request: &CompletionRequest) -> crate::Result<CompletionResponse> {
            Err(crate::GatewayError::AuthenticationFailed)
        }
    }

    struct CountingProvider {
        name: &'static str,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Provider for CountingProvider {
        fn provider_name(&self) -> &str {
            self.name
        }

        async fn generate_completion(&self, _request: &CompletionRequest) -> crate::Result<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CompletionResponse {
                text: "hi".to_string(),
                model_name: self.name.to_string(),
                usage: Usage::default(),
            })
        }
    }

    fn no_semantic_cache() -> Arc<SemanticCache> {
        Arc::new(SemanticCache::with_backends(
            Arc::new(crate::cache::store::InMemoryStore::new(100, Duration::from_secs(60))),
            None,
            0.95,
            Duration::from_secs(60),
        ))
    }

    fn fast_limiters(names: &[&str]) -> HashMap<String, Arc<TokenBucket>> {
        names
            .iter()
            .map(|n| (n.to_string(), Arc::new(TokenBucket::new(1000.0, Duration::from_secs(1)))))
            .collect()
    }

    #[tokio::test]
    async fn returns_one_response_per_provider_in_registration_order() {
        let mut registry = ProviderRegistry::new();
        registry.add(Arc::new(StubProvider { name: "a", delay: Duration::from_millis(50) }));
        registry.add(Arc::new(StubProvider { name: "b", delay: Duration::ZERO }));

        let orchestrator = Orchestrator::new(
            registry,
            fast_limiters(&["a", "b"]),
            no_semantic_cache(),
            Duration::from_secs(5),
        );

        let responses = orchestrator.run_inference("hello", 0.7, None).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].provider, "a");
        assert_eq!(responses[1].provider, "b");
    }

    #[tokio::test]
    async fn partial_failure_does_not_drop_other_responses() {
        let mut registry = ProviderRegistry::new();
        registry.add(Arc::new(FailingProvider { name: "bad" }));
        registry.add(Arc::new(StubProvider { name: "good", delay: Duration::ZERO }));

        let orchestrator = Orchestrator::new(
            registry,
            fast_limiters(&["bad", "good"]),
            no_semantic_cache(),
            Duration::from_secs(5),
        );

        let responses = orchestrator.run_inference("hello", 0.7, None).await;
        assert_eq!(responses.len(), 2);
        assert!(responses[0].error.is_some());
        assert_eq!(responses[0].text, "");
        assert!(responses[1].error.is_none());
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_with_zero_latency() {
        let mut registry = ProviderRegistry::new();
        let calls = Arc::new(AtomicU32::new(0));
        registry.add(Arc::new(CountingProvider { name: "once", calls: calls.clone() }));

        let orchestrator = Orchestrator::new(
            registry,
            fast_limiters(&["once"]),
            no_semantic_cache(),
            Duration::from_secs(5),
        );

        let first = orchestrator.run_inference("hello", 0.7, None).await;
        assert_eq!(first[0].latency_s > 0.0 || calls.load(Ordering::SeqCst) == 1, true);

        // Give the detached cache-write task a chance to land.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = orchestrator.run_inference("hello", 0.7, None).await;
        assert_eq!(second[0].latency_s, 0.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_yields_errored_response_without_failing_request() {
        let mut registry = ProviderRegistry::new();
        registry.add(Arc::new(StubProvider { name: "slow", delay: Duration::from_millis(200) }));

        let orchestrator = Orchestrator::new(
            registry,
            fast_limiters(&["slow"]),
            no_semantic_cache(),
            Duration::from_millis(20),
        );

        let responses = orchestrator.run_inference("hello", 0.7, None).await;
        assert_eq!(responses.len(), 1);
        assert!(responses[0].error.is_some());
        assert_eq!(responses[0].text, "");
    }
}
