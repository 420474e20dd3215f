//! Two-tier semantic response cache.
//!
//! The exact tier keys on an MD5 hash of the prompt and provider, giving
//! O(1) hits for identical prompts. The semantic tier embeds the prompt with
//! a local sentence-transformer model and scans previously-seen prompts for
//! one whose cosine similarity clears [`CacheConfig::similarity_threshold`].
//! A semantic write is a single `insert` of a fully-built entry, so there is
//! never a partially-written semantic record visible to a concurrent reader.

pub mod embedding;
pub mod store;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::telemetry;
use embedding::{cosine_similarity, LocalEmbedder};
use store::{InMemoryStore, KeyValueStore};

/// Configuration for the [`SemanticCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries held by the underlying store. Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live for cached entries. Default: 1 hour, matching the
    /// original gateway's `CACHE_TTL` default.
    pub ttl: Duration,
    /// Minimum cosine similarity for a semantic-tier hit. Default: 0.95.
    pub similarity_threshold: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
            similarity_threshold: 0.95,
        }
    }
}

/// Snapshot of cache health, returned by `GET /api/v1/cache/stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub semantic_enabled: bool,
    pub total_keys: u64,
    pub keyspace_hits: u64,
    pub keyspace_misses: u64,
    pub similarity_threshold: f32,
    pub ttl_seconds: u64,
}

#[derive(Serialize, Deserialize)]
struct SemanticEntry {
    prompt: String,
    embedding: Vec<f32>,
    response: String,
}

/// Two-tier cache sitting in front of the orchestrator's provider fan-out.
///
/// Constructed once at startup and shared via `Arc` — never a process-wide
/// singleton, so tests can stand up isolated instances.
pub struct SemanticCache {
    store: Arc<dyn KeyValueStore>,
    embedder: Option<LocalEmbedder>,
    similarity_threshold: f32,
    ttl: Duration,
    keyspace_hits: AtomicU64,
    keyspace_misses: AtomicU64,
}

impl SemanticCache {
    /// Build a cache backed by the default in-process store.
    ///
    /// Loads the local embedding model eagerly; if that fails, the cache
    /// still functions with the exact tier only and logs a warning (the
    /// semantic tier is a quality-of-life improvement, not a correctness
    /// requirement).
    pub fn new(config: CacheConfig, model_cache_dir: std::path::PathBuf) -> Self {
        let store = Arc::new(InMemoryStore::new(config.max_entries, config.ttl));
        let embedder = match LocalEmbedder::new(model_cache_dir) {
            Ok(embedder) => Some(embedder),
            Err(e) => {
                warn!(error = %e, "semantic cache embedding model failed to load, disabling semantic tier");
                None
            }
        };
        Self {
            store,
            embedder,
            similarity_threshold: config.similarity_threshold,
            ttl: config.ttl,
            keyspace_hits: AtomicU64::new(0),
            keyspace_misses: AtomicU64::new(0),
        }
    }

    /// Build a cache over a caller-supplied store and embedder, for testing.
    pub fn with_backends(
        store: Arc<dyn KeyValueStore>,
        embedder: Option<LocalEmbedder>,
        similarity_threshold: f32,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            embedder,
            similarity_threshold,
            ttl,
            keyspace_hits: AtomicU64::new(0),
            keyspace_misses: AtomicU64::new(0),
        }
    }

    fn exact_key(provider: &str, prompt: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(prompt.as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("cache:{provider}:exact:{hex}")
    }

    fn semantic_prefix(provider: &str) -> String {
        format!("cache:{provider}:semantic:")
    }

    fn semantic_key(provider: &str, prompt: &str) -> String {
        format!("{}{}", Self::semantic_prefix(provider), &Self::exact_hash(prompt)[..8])
    }

    fn exact_hash(prompt: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(prompt.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Look up a cached response for `prompt` under `provider`.
    ///
    /// Checks the exact tier first; on miss, and if the embedding model
    /// loaded successfully, scans the semantic tier for the best match at or
    /// above the configured similarity threshold.
    pub async fn get(&self, prompt: &str, provider: &str) -> Option<String> {
        if let Some(hit) = self.store.get(&Self::exact_key(provider, prompt)).await {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "exact").increment(1);
            self.keyspace_hits.fetch_add(1, Ordering::Relaxed);
            return Some(hit);
        }

        let Some(embedder) = &self.embedder else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "exact").increment(1);
            self.keyspace_misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let query_embedding = match embedder.embed(prompt).await {
            Ok(e) => e,
            Err(_) => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "exact").increment(1);
                self.keyspace_misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let prefix = Self::semantic_prefix(provider);
        let mut best: Option<(f32, String)> = None;
        for key in self.store.keys_with_prefix(&prefix).await {
            let Some(raw) = self.store.get(&key).await else {
                continue;
            };
            let Ok(entry) = serde_json::from_str::<SemanticEntry>(&raw) else {
                continue;
            };
            let similarity = cosine_similarity(&query_embedding, &entry.embedding);
            if similarity >= self.similarity_threshold
                && best.as_ref().map(|(s, _)| similarity > *s).unwrap_or(true)
            {
                best = Some((similarity, entry.response));
            }
        }

        match best {
            Some((_, response)) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "semantic").increment(1);
                self.keyspace_hits.fetch_add(1, Ordering::Relaxed);
                Some(response)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "semantic").increment(1);
                self.keyspace_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Write `response` into both tiers under `provider`.
    ///
    /// The semantic write is a single `insert` of a fully-constructed
    /// [`SemanticEntry`] so no partial entry is ever observable.
    pub async fn set(&self, prompt: &str, provider: &str, response: &str) {
        self.store
            .set(Self::exact_key(provider, prompt), response.to_string())
            .await;

        let Some(embedder) = &self.embedder else {
            return;
        };

        let Ok(embedding) = embedder.embed(prompt).await else {
            return;
        };

        let entry = SemanticEntry {
            prompt: prompt.to_string(),
            embedding,
            response: response.to_string(),
        };
        if let Ok(serialized) = serde_json::to_string(&entry) {
            self.store
                .set(Self::semantic_key(provider, prompt), serialized)
                .await;
        }
    }

    /// Drop all entries for `provider`, or every entry if `provider` is `None`.
    pub async fn clear(&self, provider: Option<&str>) {
        let prefix = match provider {
            Some(p) => format!("cache:{p}:"),
            None => "cache:".to_string(),
        };
        for key in self.store.keys_with_prefix(&prefix).await {
            self.store.remove(&key).await;
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: true,
            semantic_enabled: self.embedder.is_some(),
            total_keys: self.store.len(),
            keyspace_hits: self.keyspace_hits.load(Ordering::Relaxed),
            keyspace_misses: self.keyspace_misses.load(Ordering::Relaxed),
            similarity_threshold: self.similarity_threshold,
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}
