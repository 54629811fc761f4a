//! Metadata reconciliation engine.
//!
//! Given a stored [`MediaRecord`] with partial metadata, the engine consults
//! external catalogs in the caller's preferred order, validates what they
//! return against the record, computes a policy-constrained diff and applies
//! it, either as a dry-run preview or as a commit.
//!
//! The pieces, leaves first:
//!
//! - [`identifiers`] -- catalog ids from a record's external link blob.
//! - [`provider`] and [`providers`] -- the [`CatalogAdapter`] trait and the
//!   OMDb, TMDB and Trakt adapters.
//! - [`matching`] -- title validation of candidates.
//! - [`governor`] -- per-provider throttling and retry.
//! - [`resolver`] -- ordered fallback across catalogs.
//! - [`changes`] -- change-set computation.
//! - [`batch`] -- sequential batch runs with progress reporting.
//! - [`approval`] -- preview, human approval, commit.
//!
//! [`Reconciler`] is the entry point most callers want.

pub mod approval;
pub mod batch;
pub mod changes;
pub mod episode;
pub mod governor;
pub mod identifiers;
pub mod matching;
pub mod options;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use approval::{ApprovalWorkflow, CommitSummary, ReviewItem, WorkflowError, WorkflowState};
pub use batch::{ApiStatus, BatchProgress, BatchRunner, PreviewResult, ReconcileError};
pub use changes::ChangeSet;
pub use governor::{RateLimitGovernor, RateLimitState};
pub use identifiers::{extract_identifiers, ExternalIdentifierSet};
pub use options::ReconcileOptions;
pub use provider::{AdapterError, CatalogAdapter, Lookup, RateLimitInfo, UpdateCandidate};
pub use registry::AdapterRegistry;
pub use resolver::{ResolveOutcome, SourceResolver};

use std::sync::Arc;

use anyhow::Context;

use crate::config::Config;
use crate::images::CoverFetcher;
use crate::store::{ContentStore, MediaRecord};

/// Caller-facing reconciliation service.
pub struct Reconciler {
    runner: BatchRunner,
}

impl Reconciler {
    pub fn new(runner: BatchRunner) -> Self {
        Self { runner }
    }

    /// Wire up the built-in adapters, a fresh governor and the cover
    /// pipeline from `config`.
    pub fn from_config(config: &Config, store: Arc<dyn ContentStore>) -> anyhow::Result<Self> {
        let registry =
            AdapterRegistry::from_config(config, store.clone()).context("Failed to set up catalog adapters")?;
        let governor = Arc::new(RateLimitGovernor::new(config.rate_limit.clone()));
        let resolver = SourceResolver::new(Arc::new(registry), governor);
        let covers = CoverFetcher::new(&config.cover, config.batch.request_timeout())?;

        Ok(Self::new(BatchRunner::new(
            resolver,
            store,
            covers,
            config.batch.item_delay(),
        )))
    }

    pub fn runner(&self) -> &BatchRunner {
        &self.runner
    }

    pub fn governor(&self) -> &Arc<RateLimitGovernor> {
        self.runner.resolver().governor()
    }

    /// Find a validated candidate for one record.
    ///
    /// Returns `Ok(None)` when no catalog has a match, and
    /// [`ReconcileError::RateLimited`] when nothing matched and a catalog was
    /// throttled.
    pub async fn fetch_update_data(
        &self,
        record: &MediaRecord,
        options: &ReconcileOptions,
    ) -> Result<Option<UpdateCandidate>, ReconcileError> {
        match self.runner.resolver().resolve(record, options).await {
            ResolveOutcome::Found(candidate) => Ok(Some(candidate)),
            ResolveOutcome::NotFound => Ok(None),
            ResolveOutcome::RateLimited(throttled) => match throttled.into_iter().next() {
                Some(info) => Err(ReconcileError::RateLimited(info)),
                None => Ok(None),
            },
        }
    }

    /// Changes `candidate` would make to `record` under `options`.
    pub fn analyze_changes(
        &self,
        record: &MediaRecord,
        candidate: &UpdateCandidate,
        options: &ReconcileOptions,
    ) -> Option<ChangeSet> {
        changes::analyze_changes(record, candidate, options)
    }

    /// Run a batch; see [`BatchRunner::process_bulk_update`].
    pub async fn process_bulk_update<F>(
        &self,
        records: &[MediaRecord],
        options: &ReconcileOptions,
        on_progress: F,
        is_preview: bool,
    ) -> Vec<PreviewResult>
    where
        F: FnMut(&BatchProgress),
    {
        self.runner
            .process_bulk_update(records, options, on_progress, is_preview)
            .await
    }
}
