//! In-process key/value store abstraction backing the semantic cache.
//!
//! A shared external store (Redis and similar) would let a cache span
//! multiple gateway processes. This gateway runs as a single process, so
//! the default (and only shipped) implementation is an in-memory moka
//! cache — but the trait seam is kept so a distributed backend could be
//! dropped in later without touching [`crate::cache::SemanticCache`].

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

/// A string-keyed, string-valued store with per-entry TTL set at
/// construction time.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: String, value: String);
    async fn remove(&self, key: &str);
    /// Keys currently live in the store whose name starts with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
    fn len(&self) -> u64;
}

/// Default, in-process [`KeyValueStore`] backed by `moka::future::Cache`.
pub struct InMemoryStore {
    cache: Cache<String, String>,
}

impl InMemoryStore {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key).await
    }

    async fn set(&self, key: String, value: String) {
        self.cache.insert(key, value).await;
    }

    async fn remove(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.cache
            .iter()
            .filter_map(|(k, _)| {
                if k.starts_with(prefix) {
                    Some((*k).clone())
                } else {
                    None
                }
            })
            .collect()
    }

    fn len(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryStore::new(100, Duration::from_secs(60));
        store.set("a".to_string(), "1".to_string()).await;
        assert_eq!(store.get("a").await, Some("1".to_string()));
        assert_eq!(store.get("missing").await, None);
    }

    #[tokio::test]
    async fn remove_evicts_entry() {
        let store = InMemoryStore::new(100, Duration::from_secs(60));
        store.set("a".to_string(), "1".to_string()).await;
        store.remove("a").await;
        assert_eq!(store.get("a").await, None);
    }

    #[tokio::test]
    async fn keys_with_prefix_filters() {
        let store = InMemoryStore::new(100, Duration::from_secs(60));
        store.set("cache:a:exact:1".to_string(), "x".to_string()).await;
        store.set("cache:a:semantic:1".to_string(), "y".to_string()).await;
        store.set("cache:b:exact:1".to_string(), "z".to_string()).await;
        store.cache.run_pending_tasks().await;
        let keys = store.keys_with_prefix("cache:a:semantic:").await;
        assert_eq!(keys, vec!["cache:a:semantic:1".to_string()]);
    }
}
