//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real Prometheus exporter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use heimdall_gateway::cache::SemanticCache;
use heimdall_gateway::cache::store::InMemoryStore;
use heimdall_gateway::providers::rate_limit::TokenBucket;
use heimdall_gateway::providers::registry::ProviderRegistry;
use heimdall_gateway::providers::traits::{CompletionRequest, CompletionResponse, Provider, Usage};
use heimdall_gateway::telemetry;
use heimdall_gateway::{GatewayError, Orchestrator};

struct StubProvider {
    name: &'static str,
}

#[async_trait]
impl Provider for StubProvider {
    fn provider_name(&self) -> &str {
        self.name
    }

    async fn generate_completion(
        &self,
        request: &CompletionRequest,
    ) -> heimdall_gateway::Result<CompletionResponse> {
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

    async fn generate_completion(
        &self,
        _request: &CompletionRequest,
    ) -> heimdall_gateway::Result<CompletionResponse> {
        Err(GatewayError::AuthenticationFailed)
    }
}

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

fn no_semantic_cache() -> Arc<SemanticCache> {
    Arc::new(SemanticCache::with_backends(
        Arc::new(InMemoryStore::new(100, Duration::from_secs(60))),
        None,
        0.95,
        Duration::from_secs(60),
    ))
}

fn fast_limiters(names: &[&str]) -> HashMap<String, Arc<TokenBucket>> {
    names
        .iter()
        .map(|n| {
            (
                n.to_string(),
                Arc::new(TokenBucket::new(1000.0, Duration::from_secs(1))),
            )
        })
        .collect()
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays on
/// the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn successful_provider_call_records_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let mut registry = ProviderRegistry::new();
                registry.add(Arc::new(StubProvider { name: "ok" }));
                let orchestrator = Orchestrator::new(
                    registry,
                    fast_limiters(&["ok"]),
                    no_semantic_cache(),
                    Duration::from_secs(5),
                );
                orchestrator.run_inference("hello", 0.7, None).await
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    let count = counter_total(&snapshot, telemetry::PROVIDER_CALLS_TOTAL);
    assert_eq!(count, 1, "expected 1 provider call counter");
    assert!(
        has_histogram(&snapshot, telemetry::PROVIDER_DURATION_SECONDS),
        "expected a provider duration histogram entry"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn failed_provider_call_records_error_status() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let mut registry = ProviderRegistry::new();
                registry.add(Arc::new(FailingProvider { name: "bad" }));
                let orchestrator = Orchestrator::new(
                    registry,
                    fast_limiters(&["bad"]),
                    no_semantic_cache(),
                    Duration::from_secs(5),
                );
                orchestrator.run_inference("hello", 0.7, None).await
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    let error_count = snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == telemetry::PROVIDER_CALLS_TOTAL
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == "status" && l.value() == "error")
        })
        .count();
    assert_eq!(error_count, 1, "expected one error-status counter entry");
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    let mut registry = ProviderRegistry::new();
    registry.add(Arc::new(StubProvider { name: "ok" }));
    let orchestrator = Orchestrator::new(
        registry,
        fast_limiters(&["ok"]),
        no_semantic_cache(),
        Duration::from_secs(5),
    );
    let responses = orchestrator.run_inference("hello", 0.7, None).await;
    assert_eq!(responses.len(), 1);
    assert!(responses[0].error.is_none());
}
