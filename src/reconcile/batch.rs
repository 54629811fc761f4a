//! Sequential batch reconciliation.
//!
//! [`BatchRunner::process_bulk_update`] resolves each record in turn, computes
//! its change set and, outside preview mode, persists it. Records are never
//! processed concurrently. Every record yields exactly one [`PreviewResult`],
//! in input order; failures are reported on the record's entry and never
//! abort the batch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mediasync_common::{CoverImageMode, Provider, RecordId};
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::changes::{analyze_changes, ChangeSet};
use super::options::ReconcileOptions;
use super::provider::{RateLimitInfo, UpdateCandidate};
use super::resolver::{ResolveOutcome, SourceResolver};
use crate::images::CoverFetcher;
use crate::store::{ContentStore, MediaRecord, StoreError};

/// Failure while reconciling one record.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{0}")]
    RateLimited(RateLimitInfo),

    #[error("Failed to persist changes: {0}")]
    Persistence(#[from] StoreError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// What the catalogs are doing for the current record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApiStatus {
    /// A candidate came from `source`.
    Active { source: String },
    /// `provider` is throttled.
    RateLimited {
        provider: Provider,
        retry_after: Option<Duration>,
    },
}

/// Progress report emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    /// 1-based index of the current record.
    pub current: usize,
    pub total: usize,
    pub current_item_label: String,
    pub api_status: Option<ApiStatus>,
}

/// Outcome for one record of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewResult {
    pub record: MediaRecord,
    pub change_set: Option<ChangeSet>,
    pub error: Option<String>,
    pub has_changes: bool,
    /// The record was skipped because every catalog that could answer was
    /// throttled.
    pub rate_limited: bool,
}

impl PreviewResult {
    fn unchanged(record: &MediaRecord) -> Self {
        Self {
            record: record.clone(),
            change_set: None,
            error: None,
            has_changes: false,
            rate_limited: false,
        }
    }

    fn throttled(record: &MediaRecord) -> Self {
        Self {
            rate_limited: true,
            ..Self::unchanged(record)
        }
    }

    fn changed(record: &MediaRecord, change_set: ChangeSet) -> Self {
        Self {
            record: record.clone(),
            change_set: Some(change_set),
            error: None,
            has_changes: true,
            rate_limited: false,
        }
    }

    fn failed(record: &MediaRecord, error: &ReconcileError) -> Self {
        Self {
            record: record.clone(),
            change_set: None,
            error: Some(error.to_string()),
            has_changes: false,
            rate_limited: false,
        }
    }
}

/// Runs batches against one content store.
pub struct BatchRunner {
    resolver: SourceResolver,
    store: Arc<dyn ContentStore>,
    covers: CoverFetcher,
    item_delay: Duration,
}

impl BatchRunner {
    pub fn new(
        resolver: SourceResolver,
        store: Arc<dyn ContentStore>,
        covers: CoverFetcher,
        item_delay: Duration,
    ) -> Self {
        Self {
            resolver,
            store,
            covers,
            item_delay,
        }
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Pause between consecutive records.
    pub fn item_delay(&self) -> Duration {
        self.item_delay
    }

    /// Reconcile `records` in order.
    ///
    /// In preview mode nothing is downloaded, uploaded or written; the
    /// returned change sets describe what a commit run would do.
    pub async fn process_bulk_update<F>(
        &self,
        records: &[MediaRecord],
        options: &ReconcileOptions,
        mut on_progress: F,
        is_preview: bool,
    ) -> Vec<PreviewResult>
    where
        F: FnMut(&BatchProgress),
    {
        let total = records.len();
        let mut results = Vec::with_capacity(total);
        info!(total, is_preview, "Starting batch");

        for (index, record) in records.iter().enumerate() {
            if index > 0 && !self.item_delay.is_zero() {
                sleep(self.item_delay).await;
            }

            let mut progress = BatchProgress {
                current: index + 1,
                total,
                current_item_label: record.display_name.clone(),
                api_status: None,
            };
            on_progress(&progress);

            let result = match self.resolver.resolve(record, options).await {
                ResolveOutcome::Found(candidate) => {
                    progress.api_status = Some(ApiStatus::Active {
                        source: candidate.source.clone(),
                    });
                    on_progress(&progress);

                    match self.apply(record, &candidate, options, is_preview).await {
                        Ok(result) => result,
                        Err(e) => {
                            warn!(record_id = %record.id, error = %e, "Failed to reconcile record");
                            PreviewResult::failed(record, &e)
                        }
                    }
                }
                ResolveOutcome::NotFound => {
                    debug!(record_id = %record.id, "No catalog data found");
                    PreviewResult::unchanged(record)
                }
                ResolveOutcome::RateLimited(throttled) => {
                    for info in &throttled {
                        progress.api_status = Some(ApiStatus::RateLimited {
                            provider: info.provider,
                            retry_after: info.retry_after,
                        });
                        on_progress(&progress);
                    }
                    warn!(record_id = %record.id, providers = throttled.len(), "Record skipped: providers throttled");
                    PreviewResult::throttled(record)
                }
            };
            results.push(result);
        }

        let changed = results.iter().filter(|r| r.has_changes).count();
        let failed = results.iter().filter(|r| r.error.is_some()).count();
        info!(total, changed, failed, is_preview, "Batch finished");
        results
    }

    async fn apply(
        &self,
        record: &MediaRecord,
        candidate: &UpdateCandidate,
        options: &ReconcileOptions,
        is_preview: bool,
    ) -> Result<PreviewResult, ReconcileError> {
        let Some(mut changes) = analyze_changes(record, candidate, options) else {
            return Ok(PreviewResult::unchanged(record));
        };

        if !is_preview {
            self.commit(&record.id, &mut changes, options).await?;
        }
        Ok(PreviewResult::changed(record, changes))
    }

    /// Persist a change set. In binary cover mode the cover is uploaded
    /// first; when that fails the URL is stored instead.
    async fn commit(
        &self,
        id: &RecordId,
        changes: &mut ChangeSet,
        options: &ReconcileOptions,
    ) -> Result<(), ReconcileError> {
        let mut patch = changes.to_patch();

        if options.cover_image_mode == CoverImageMode::Binary {
            if let Some(ref url) = changes.cover_image_url {
                match self.upload_cover(id, url).await {
                    Ok(()) => {
                        patch.cover_image_url = None;
                        changes.cover_uploaded = true;
                    }
                    Err(e) => {
                        warn!(record_id = %id, error = %e, "Binary cover upload failed; storing URL instead");
                    }
                }
            }
        }

        if patch.is_empty() {
            debug!(record_id = %id, "Nothing left to write");
            return Ok(());
        }

        self.store.update(id, &patch).await?;
        info!(
            record_id = %id,
            source = %changes.source,
            fields = ?changes.fields(),
            cover_uploaded = changes.cover_uploaded,
            "Committed changes"
        );
        Ok(())
    }

    async fn upload_cover(&self, id: &RecordId, url: &str) -> anyhow::Result<()> {
        let blob = self.covers.fetch(url).await?;
        let hash = blob.hash.clone();
        self.store
            .put_binary(id, blob)
            .await
            .context("Failed to upload cover image")?;
        debug!(record_id = %id, hash = %hash, "Uploaded cover image");
        Ok(())
    }
}
