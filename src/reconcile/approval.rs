//! Preview, approval and commit workflow.
//!
//! ```text
//!            start_preview            confirm
//!   Options ───────────────► Preview ─────────► Processing ──► Results
//!      ▲                        │                                 │
//!      └──────── back ──────────┘◄──────────── reset ─────────────┘
//! ```
//!
//! Entering `Preview` runs a full preview batch. Items proposing a new title
//! are scored by token overlap between the current and proposed titles and
//! approved or rejected by default accordingly. A human may flip any item
//! before confirming. Confirming commits each approved item that has changes
//! in its own single-record run.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use super::batch::{BatchProgress, PreviewResult, ReconcileError};
use super::options::ReconcileOptions;
use super::Reconciler;
use crate::store::MediaRecord;

/// Similarity at or above which a title change is approved outright.
pub const APPROVE_THRESHOLD: f64 = 0.8;
/// Similarity at or above which a title change is approved with a warning.
pub const VERIFY_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Options,
    Preview,
    Processing,
    Results,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cannot {action} from the {from:?} state")]
    InvalidTransition { from: WorkflowState, action: &'static str },

    #[error("No review item at index {0}")]
    UnknownItem(usize),
}

/// A preview result with its approval decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    pub result: PreviewResult,
    pub approved: bool,
    pub similarity_score: Option<f64>,
    pub warning: Option<String>,
}

impl ReviewItem {
    fn from_result(result: PreviewResult) -> Self {
        let proposed = result.change_set.as_ref().and_then(|c| c.title.as_deref());

        let Some(proposed) = proposed else {
            let approved = result.has_changes;
            return Self {
                result,
                approved,
                similarity_score: None,
                warning: None,
            };
        };

        let score = title_similarity(&result.record.display_name, proposed);
        let (approved, warning) = if score >= APPROVE_THRESHOLD {
            (true, None)
        } else if score >= VERIFY_THRESHOLD {
            (true, Some(format!("Title similarity {:.0}%, please verify", score * 100.0)))
        } else {
            (false, Some(format!("Title change rejected: low similarity ({:.0}%)", score * 100.0)))
        };

        Self {
            result,
            approved,
            similarity_score: Some(score),
            warning,
        }
    }

    /// Whether confirming would commit this item.
    pub fn will_commit(&self) -> bool {
        self.approved && self.result.has_changes
    }
}

/// Totals of a commit run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

fn tokens(title: &str) -> HashSet<String> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Token-overlap (Dice) similarity of two titles, from 0.0 to 1.0.
///
/// Titles are split into lowercase alphanumeric words. Two titles without
/// any words score 1.0 only when they are equal ignoring case.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a_tokens = tokens(a);
    let b_tokens = tokens(b);

    if a_tokens.is_empty() || b_tokens.is_empty() {
        return if a.trim().eq_ignore_ascii_case(b.trim()) { 1.0 } else { 0.0 };
    }

    let shared = a_tokens.intersection(&b_tokens).count();
    (2 * shared) as f64 / (a_tokens.len() + b_tokens.len()) as f64
}

/// Why a single-record commit run wrote nothing, if it did not.
///
/// The commit run resolves the record again, so a throttled catalog or a
/// vanished match leaves the record untouched without an error.
fn commit_error(result: Option<PreviewResult>) -> Option<String> {
    let Some(result) = result else {
        return Some(ReconcileError::Unexpected("commit run returned no result".into()).to_string());
    };

    if result.error.is_some() {
        result.error
    } else if result.rate_limited {
        Some("Rate limited during commit, nothing was written".to_string())
    } else if !result.has_changes {
        Some("No changes found during commit, nothing was written".to_string())
    } else {
        None
    }
}

/// Drives one preview/approve/commit cycle.
pub struct ApprovalWorkflow {
    reconciler: Arc<Reconciler>,
    state: WorkflowState,
    options: ReconcileOptions,
    items: Vec<ReviewItem>,
    summary: Option<CommitSummary>,
}

impl ApprovalWorkflow {
    pub fn new(reconciler: Arc<Reconciler>, options: ReconcileOptions) -> Self {
        Self {
            reconciler,
            state: WorkflowState::Options,
            options,
            items: Vec::new(),
            summary: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    pub fn items(&self) -> &[ReviewItem] {
        &self.items
    }

    pub fn summary(&self) -> Option<&CommitSummary> {
        self.summary.as_ref()
    }

    fn expect_state(&self, expected: WorkflowState, action: &'static str) -> Result<(), WorkflowError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }

    /// Replace the run options. Only allowed before previewing.
    pub fn set_options(&mut self, options: ReconcileOptions) -> Result<(), WorkflowError> {
        self.expect_state(WorkflowState::Options, "change options")?;
        self.options = options;
        Ok(())
    }

    /// Run a preview batch over `records` and score the results.
    pub async fn start_preview<F>(&mut self, records: &[MediaRecord], on_progress: F) -> Result<&[ReviewItem], WorkflowError>
    where
        F: FnMut(&BatchProgress),
    {
        self.expect_state(WorkflowState::Options, "start a preview")?;

        let results = self
            .reconciler
            .process_bulk_update(records, &self.options, on_progress, true)
            .await;
        self.items = results.into_iter().map(ReviewItem::from_result).collect();
        self.state = WorkflowState::Preview;

        let approved = self.items.iter().filter(|i| i.will_commit()).count();
        info!(items = self.items.len(), approved, "Preview ready for review");
        Ok(&self.items)
    }

    /// Override the approval of one preview item.
    pub fn set_approved(&mut self, index: usize, approved: bool) -> Result<(), WorkflowError> {
        self.expect_state(WorkflowState::Preview, "change approvals")?;
        let item = self.items.get_mut(index).ok_or(WorkflowError::UnknownItem(index))?;
        item.approved = approved;
        Ok(())
    }

    /// Return to option editing, discarding the preview.
    pub fn back(&mut self) -> Result<(), WorkflowError> {
        self.expect_state(WorkflowState::Preview, "go back")?;
        self.items.clear();
        self.state = WorkflowState::Options;
        Ok(())
    }

    /// Commit every approved item with changes, one record per run.
    pub async fn confirm<F>(&mut self, mut on_progress: F) -> Result<&CommitSummary, WorkflowError>
    where
        F: FnMut(&BatchProgress),
    {
        self.expect_state(WorkflowState::Preview, "confirm")?;
        self.state = WorkflowState::Processing;

        let mut summary = CommitSummary::default();
        let delay = self.reconciler.runner().item_delay();
        let pending: Vec<MediaRecord> = self
            .items
            .iter()
            .filter(|i| i.will_commit())
            .map(|i| i.result.record.clone())
            .collect();

        for (index, record) in pending.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                sleep(delay).await;
            }

            let result = self
                .reconciler
                .process_bulk_update(std::slice::from_ref(record), &self.options, &mut on_progress, false)
                .await
                .into_iter()
                .next();
            let error = commit_error(result);

            match error {
                None => summary.succeeded += 1,
                Some(message) => {
                    warn!(record_id = %record.id, error = %message, "Commit failed");
                    summary.failed += 1;
                    summary.errors.push(format!("{}: {}", record.display_name, message));
                }
            }
        }

        info!(succeeded = summary.succeeded, failed = summary.failed, "Commit finished");
        self.state = WorkflowState::Results;
        Ok(self.summary.insert(summary))
    }

    /// Start over, clearing the preview and the commit summary.
    pub fn reset(&mut self) -> Result<(), WorkflowError> {
        self.expect_state(WorkflowState::Results, "reset")?;
        self.items.clear();
        self.summary = None;
        self.state = WorkflowState::Options;
        Ok(())
    }
}
