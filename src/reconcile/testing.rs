//! Scripted catalog adapter for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mediasync_common::{MediaType, Provider};
use parking_lot::Mutex;

use super::provider::{AdapterError, CatalogAdapter, Lookup, UpdateCandidate};
use super::{AdapterRegistry, BatchRunner, RateLimitGovernor, Reconciler, SourceResolver};
use crate::config::{CoverConfig, RateLimitConfig};
use crate::images::CoverFetcher;
use crate::store::{MediaRecord, MemoryStore};

/// Adapter answering from fixed tables and recording every call as
/// `"id:<id>"`, `"title:<title>"` or `"sub:<record id>"`.
pub(crate) struct ScriptedAdapter {
    provider: Provider,
    by_id: HashMap<String, Lookup>,
    by_title: HashMap<String, Lookup>,
    sub_resource: Option<Lookup>,
    failing: bool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAdapter {
    pub(crate) fn new(provider: Provider) -> Self {
        Self {
            provider,
            by_id: HashMap::new(),
            by_title: HashMap::new(),
            sub_resource: None,
            failing: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_id(mut self, id: &str, lookup: Lookup) -> Self {
        self.by_id.insert(id.to_string(), lookup);
        self
    }

    pub(crate) fn with_title(mut self, title: &str, lookup: Lookup) -> Self {
        self.by_title.insert(title.to_string(), lookup);
        self
    }

    pub(crate) fn with_sub_resource(mut self, lookup: Lookup) -> Self {
        self.sub_resource = Some(lookup);
        self
    }

    /// Every call fails with a transport error.
    pub(crate) fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn answer(&self, call: String, lookup: Option<&Lookup>) -> Result<Lookup, AdapterError> {
        self.calls.lock().push(call);
        if self.failing {
            return Err(AdapterError::Request {
                provider: self.provider,
                message: "connection refused".into(),
            });
        }
        Ok(lookup.cloned().unwrap_or(Lookup::NotFound))
    }
}

#[async_trait]
impl CatalogAdapter for ScriptedAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch_by_id(&self, id: &str, _: MediaType, _: &MediaRecord) -> Result<Lookup, AdapterError> {
        self.answer(format!("id:{id}"), self.by_id.get(id))
    }

    async fn search_by_title(&self, title: &str, _: MediaType) -> Result<Lookup, AdapterError> {
        self.answer(format!("title:{title}"), self.by_title.get(title))
    }

    async fn resolve_sub_resource(&self, record: &MediaRecord) -> Result<Lookup, AdapterError> {
        self.answer(format!("sub:{}", record.id), self.sub_resource.as_ref())
    }
}

/// A found candidate with a title and optional description and cover.
pub(crate) fn found(provider: Provider, title: &str, description: Option<&str>, cover: Option<&str>) -> Lookup {
    let mut candidate = UpdateCandidate::new(provider, title);
    candidate.description = description.map(str::to_string);
    candidate.cover_image_url = cover.map(str::to_string);
    Lookup::Found(candidate)
}

/// A reconciler over a single scripted adapter with no inter-item delay.
pub(crate) fn reconciler(adapter: ScriptedAdapter, store: Arc<MemoryStore>) -> Reconciler {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(adapter));
    let resolver = SourceResolver::new(
        Arc::new(registry),
        Arc::new(RateLimitGovernor::new(RateLimitConfig::default())),
    );
    let covers = CoverFetcher::new(&CoverConfig::default(), Duration::from_secs(5)).unwrap();
    Reconciler::new(BatchRunner::new(resolver, store, covers, Duration::ZERO))
}
