//! Retry configuration, delay calculation, and the `RetryingProvider` decorator.
//!
//! All retry logic lives in the shared [`with_retry`] helper; the decorator
//! just wraps a [`Provider`] and delegates each call through it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use crate::telemetry;

use super::traits::{CompletionRequest, CompletionResponse, Provider};
use crate::{GatewayError, Result};

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff with optional jitter.
///
/// ```rust
/// # use heimdall_gateway::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200))
///     .jitter(true);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 30s.
    pub max_delay: Duration,
    /// Whether to add random jitter to delays. Default: true.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Uses exponential backoff: `initial_delay * 2^attempt`, capped at
    /// `max_delay`. When `jitter` is enabled, adds uniform jitter in
    /// `[-25%, +25%]` of the capped delay, floored at 1ms so a tiny base
    /// delay can't jitter down to a tight retry loop.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let capped = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);

        if !self.jitter {
            return capped;
        }

        let capped_ms = capped.as_millis() as i64;
        let jitter_range = capped_ms / 4;
        if jitter_range == 0 {
            return capped;
        }

        let offset = rand::thread_rng().gen_range(0..=jitter_range * 2);
        let jittered_ms = (capped_ms - jitter_range + offset).max(1);
        Duration::from_millis(jittered_ms as u64)
    }

    /// Calculate the effective delay, respecting provider `retry_after` hints.
    ///
    /// If a `retry_after` duration is provided (from a `RateLimited` error),
    /// it takes precedence over the calculated backoff.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Execute an async operation with retry logic.
///
/// Retries on transient errors (as classified by [`GatewayError::is_transient`])
/// up to `config.max_attempts`, using exponential backoff and respecting
/// `retry_after` hints from `RateLimited` errors. Permanent errors are
/// returned immediately without retry.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    provider_name: &str,
    operation: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..config.max_attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                metrics::counter!(telemetry::RETRIES_TOTAL,
                    "provider" => provider_name.to_owned(),
                    "operation" => operation.to_owned(),
                )
                .increment(1);
                if attempt + 1 < config.max_attempts {
                    let delay = config.effective_delay(attempt, e.retry_after());
                    warn!(
                        provider = provider_name,
                        operation,
                        attempt = attempt + 1,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e), // permanent error, no retry
        }
    }
    Err(last_err.unwrap_or(GatewayError::NoProvider))
}

/// Decorator that wraps a [`Provider`] with retry logic.
///
/// On transient errors, retries with exponential backoff up to
/// `config.max_attempts`, respecting provider `retry_after` hints.
/// Non-transient errors are returned immediately.
pub struct RetryingProvider {
    inner: Arc<dyn Provider>,
    config: RetryConfig,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn Provider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl Provider for RetryingProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    async fn generate_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        with_retry(
            &self.config,
            self.inner.provider_name(),
            "generate_completion",
            || self.inner.generate_completion(request),
        )
        .await
    }

    async fn health_check(&self) -> Result<()> {
        with_retry(
            &self.config,
            self.inner.provider_name(),
            "health_check",
            || self.inner.health_check(),
        )
        .await
    }
}
