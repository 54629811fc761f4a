//! Source fallback resolution.
//!
//! [`SourceResolver::resolve`] walks the catalogs in the caller's preferred
//! order until one returns a candidate that passes title validation:
//!
//! 1. lookups by each catalog's own identifier, when the record links one;
//! 2. for seasons and episodes, sub-resource resolution below the parent show;
//! 3. a title search on the clean title (display name when absent);
//! 4. if that title has a colon, a search on the part before it. A hit here
//!    is reported as a "Series Match" and carries the record's display name
//!    as its title.
//!
//! Every call goes through the [`RateLimitGovernor`]. Throttled catalogs are
//! skipped for the current step; adapter errors are logged and skipped.

use std::sync::Arc;

use mediasync_common::Provider;
use tracing::{debug, warn};

use super::governor::RateLimitGovernor;
use super::identifiers::extract_identifiers;
use super::matching::{colon_prefix, titles_match};
use super::options::ReconcileOptions;
use super::provider::{AdapterError, Lookup, RateLimitInfo, UpdateCandidate};
use super::registry::AdapterRegistry;
use crate::store::MediaRecord;

/// Result of resolving one record against all preferred catalogs.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    Found(UpdateCandidate),
    NotFound,
    /// Nothing was found and these catalogs were throttled along the way.
    RateLimited(Vec<RateLimitInfo>),
}

/// Resolves records against the registered catalogs.
pub struct SourceResolver {
    registry: Arc<AdapterRegistry>,
    governor: Arc<RateLimitGovernor>,
}

impl SourceResolver {
    pub fn new(registry: Arc<AdapterRegistry>, governor: Arc<RateLimitGovernor>) -> Self {
        Self { registry, governor }
    }

    pub fn governor(&self) -> &Arc<RateLimitGovernor> {
        &self.governor
    }

    /// Find the best validated candidate for `record`.
    pub async fn resolve(&self, record: &MediaRecord, options: &ReconcileOptions) -> ResolveOutcome {
        let expected = record.display_name.as_str();
        let ids = extract_identifiers(record.external_links.as_deref().unwrap_or_default());
        let adapters = self.registry.ordered(&options.preferred_sources);
        let mut throttled = Vec::new();

        for adapter in &adapters {
            let provider = adapter.provider();
            let Some(id) = ids.for_provider(provider) else {
                continue;
            };
            let result = self
                .governor
                .call(provider, || adapter.fetch_by_id(id, record.media_type, record))
                .await;
            if let Some(candidate) = accept(record, "id", provider, result, expected, &mut throttled) {
                return ResolveOutcome::Found(candidate);
            }
        }

        if record.media_type.is_sub_resource() {
            for adapter in &adapters {
                let provider = adapter.provider();
                let result = self
                    .governor
                    .call(provider, || adapter.resolve_sub_resource(record))
                    .await;
                if let Some(candidate) = accept(record, "sub_resource", provider, result, expected, &mut throttled) {
                    return ResolveOutcome::Found(candidate);
                }
            }
        }

        let title = record.search_title();
        for adapter in &adapters {
            let provider = adapter.provider();
            let result = self
                .governor
                .call(provider, || adapter.search_by_title(title, record.media_type))
                .await;
            if let Some(candidate) = accept(record, "title", provider, result, expected, &mut throttled) {
                return ResolveOutcome::Found(candidate);
            }
        }

        if let Some(prefix) = colon_prefix(title) {
            for adapter in &adapters {
                let provider = adapter.provider();
                let result = self
                    .governor
                    .call(provider, || adapter.search_by_title(prefix, record.media_type))
                    .await;
                if let Some(mut candidate) = accept(record, "series_match", provider, result, expected, &mut throttled)
                {
                    candidate.source = format!("{} (Series Match)", provider.label());
                    candidate.title = expected.to_string();
                    return ResolveOutcome::Found(candidate);
                }
            }
        }

        if throttled.is_empty() {
            debug!(record_id = %record.id, "No catalog matched");
            ResolveOutcome::NotFound
        } else {
            ResolveOutcome::RateLimited(throttled)
        }
    }
}

/// Turn one governed call into an accepted candidate, noting throttling and
/// logging failures along the way.
fn accept(
    record: &MediaRecord,
    step: &'static str,
    provider: Provider,
    result: Result<Lookup, AdapterError>,
    expected: &str,
    throttled: &mut Vec<RateLimitInfo>,
) -> Option<UpdateCandidate> {
    match result {
        Ok(Lookup::Found(candidate)) => {
            if titles_match(&candidate.title, expected) {
                debug!(record_id = %record.id, provider = %provider, step, "Candidate accepted");
                Some(candidate)
            } else {
                debug!(
                    record_id = %record.id,
                    provider = %provider,
                    step,
                    candidate = %candidate.title,
                    expected,
                    "Candidate rejected by title validation"
                );
                None
            }
        }
        Ok(Lookup::NotFound) => None,
        Ok(Lookup::RateLimited(info)) => {
            warn!(record_id = %record.id, provider = %provider, step, "Skipping throttled provider");
            if !throttled.iter().any(|t| t.provider == info.provider) {
                throttled.push(info);
            }
            None
        }
        Err(AdapterError::NotImplemented(_)) => {
            debug!(provider = %provider, step, "Provider not implemented");
            None
        }
        Err(e) => {
            warn!(record_id = %record.id, provider = %provider, step, error = %e, "Provider lookup failed");
            None
        }
    }
}
