//! Provider registry.
//!
//! Unlike a fallback chain, the orchestrator fans a request out to every
//! registered provider concurrently rather than trying them in priority
//! order — the registry here just holds the configured set, in registration
//! order, so the orchestrator can index results back to stable provider
//! identity.

use std::sync::Arc;

use super::traits::Provider;

/// The set of providers a gateway instance was configured with.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Order is preserved and used to index results
    /// back to provider identity after a parallel fan-out.
    pub fn add(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.provider_name().to_string())
            .collect()
    }
}

impl<'a> IntoIterator for &'a ProviderRegistry {
    type Item = &'a Arc<dyn Provider>;
    type IntoIter = std::slice::Iter<'a, Arc<dyn Provider>>;

    fn into_iter(self) -> Self::IntoIter {
        self.providers.iter()
    }
}
