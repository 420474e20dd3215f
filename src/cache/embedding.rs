//! Local sentence embedding model backing the semantic cache tier.
//!
//! Loaded eagerly at [`crate::cache::SemanticCache::new`] time so the
//! request path never pays a model cold-start cost. `fastembed::TextEmbedding`
//! is not `Sync`-safe to call concurrently, so access is serialised behind a
//! blocking mutex and offloaded to `spawn_blocking`.

use std::sync::{Arc, Mutex};

use crate::error::{GatewayError, Result};

/// `all-MiniLM-L6-v2`, 384 dimensions — matches the original semantic cache's
/// `sentence-transformers/all-MiniLM-L6-v2`.
const EMBEDDING_DIMENSIONS: usize = 384;

/// Wraps a local `fastembed` model for computing prompt embeddings.
pub struct LocalEmbedder {
    model: Arc<Mutex<fastembed::TextEmbedding>>,
}

impl LocalEmbedder {
    /// Load the model, downloading it to the cache directory if necessary.
    pub fn new(cache_dir: std::path::PathBuf) -> Result<Self> {
        let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
            .with_cache_dir(cache_dir);

        let model = fastembed::TextEmbedding::try_new(options).map_err(|e| {
            GatewayError::Configuration(format!("failed to load embedding model: {e}"))
        })?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }

    pub fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    /// Compute the embedding for `text`. The model is not safely shared
    /// across concurrent calls, so access is serialised behind the mutex
    /// and offloaded to a blocking thread.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_owned();
        let model = self.model.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|e| GatewayError::Configuration(format!("embedder lock poisoned: {e}")))?;
            guard
                .embed(vec![text], None)
                .map_err(|e| GatewayError::Configuration(format!("embedding failed: {e}")))
        })
        .await
        .map_err(|e| GatewayError::Configuration(format!("embedder task join error: {e}")))??;

        result
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Configuration("embedder returned no vector".to_string()))
    }
}

/// Cosine similarity between two equal-length vectors. Returns 0.0 if either
/// is zero-length or the vectors differ in length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![0.1, 0.2, 0.3];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_lengths_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
