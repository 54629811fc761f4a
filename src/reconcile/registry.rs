//! Registry of catalog adapters.
//!
//! The [`AdapterRegistry`] holds at most one [`CatalogAdapter`] per
//! [`Provider`] and hands them out in a caller-chosen preference order.

use std::sync::Arc;

use mediasync_common::Provider;

use super::provider::{AdapterError, CatalogAdapter};
use super::providers::{OmdbAdapter, TmdbAdapter, TraktAdapter};
use crate::config::Config;
use crate::store::ContentStore;

/// Catalog adapters keyed by provider.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn CatalogAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every built-in adapter, configured from `config`.
    pub fn from_config(config: &Config, store: Arc<dyn ContentStore>) -> Result<Self, AdapterError> {
        let timeout = config.batch.request_timeout();

        let mut registry = Self::new();
        registry.register(Arc::new(OmdbAdapter::new(&config.providers.omdb, store.clone(), timeout)?));
        registry.register(Arc::new(TmdbAdapter::new(&config.providers.tmdb, store, timeout)?));
        registry.register(Arc::new(TraktAdapter::new()));
        Ok(registry)
    }

    /// Register an adapter, replacing any earlier adapter for the same
    /// provider.
    pub fn register(&mut self, adapter: Arc<dyn CatalogAdapter>) {
        let provider = adapter.provider();
        self.adapters.retain(|a| a.provider() != provider);
        self.adapters.push(adapter);
    }

    /// Look up the adapter for `provider`.
    pub fn get(&self, provider: Provider) -> Option<&Arc<dyn CatalogAdapter>> {
        self.adapters.iter().find(|a| a.provider() == provider)
    }

    /// Registered providers, in registration order.
    pub fn providers(&self) -> Vec<Provider> {
        self.adapters.iter().map(|a| a.provider()).collect()
    }

    /// Adapters for `preferred`, in that order. Unregistered and repeated
    /// providers are skipped.
    pub fn ordered(&self, preferred: &[Provider]) -> Vec<Arc<dyn CatalogAdapter>> {
        let mut seen = Vec::with_capacity(preferred.len());
        preferred
            .iter()
            .filter(|p| {
                if seen.contains(*p) {
                    return false;
                }
                seen.push(**p);
                true
            })
            .filter_map(|p| self.get(*p).cloned())
            .collect()
    }
}
