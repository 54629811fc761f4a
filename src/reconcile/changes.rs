//! Change-set computation.
//!
//! Compares a validated [`UpdateCandidate`] against the record's current
//! fields under the run's [`ReconcileOptions`]. A field is eligible when its
//! update flag is on and, with `only_missing`, the record's value is empty.
//! An eligible field is proposed when the candidate has a value that differs
//! from the current one. In binary cover mode an eligible cover URL is
//! proposed even when unchanged, so the image is re-uploaded.

use mediasync_common::{CoverImageMode, Provider};
use serde::Serialize;

use super::options::ReconcileOptions;
use super::provider::UpdateCandidate;
use crate::store::{MediaRecord, RecordPatch};

/// Fields to change on one record, with their provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeSet {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    pub provider: Provider,
    pub source: String,
    /// Set once the cover was uploaded as binary during commit.
    #[serde(skip)]
    pub cover_uploaded: bool,
}

impl ChangeSet {
    /// The store update for this change set.
    pub fn to_patch(&self) -> RecordPatch {
        RecordPatch {
            display_name: self.title.clone(),
            description: self.description.clone(),
            cover_image_url: self.cover_image_url.clone(),
        }
    }

    /// Names of the fields this change set touches.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.cover_image_url.is_some() {
            fields.push("cover_image_url");
        }
        fields
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn eligible(enabled: bool, only_missing: bool, current: Option<&str>) -> bool {
    enabled && (!only_missing || is_blank(current))
}

/// The candidate value, if present and different from `current`.
fn proposed(candidate: Option<&str>, current: Option<&str>, force: bool) -> Option<String> {
    let value = candidate.map(str::trim).filter(|v| !v.is_empty())?;
    if force || current.map(str::trim) != Some(value) {
        Some(value.to_string())
    } else {
        None
    }
}

/// Compute the changes `candidate` would make to `record`, or `None` when
/// nothing qualifies.
pub fn analyze_changes(
    record: &MediaRecord,
    candidate: &UpdateCandidate,
    options: &ReconcileOptions,
) -> Option<ChangeSet> {
    let current_title = Some(record.display_name.as_str());
    let current_description = record.description.as_deref();
    let current_cover = record.cover_image_url.as_deref();

    let title = eligible(options.update_titles, options.only_missing, current_title)
        .then(|| proposed(Some(candidate.title.as_str()), current_title, false))
        .flatten();

    let description = eligible(options.update_descriptions, options.only_missing, current_description)
        .then(|| proposed(candidate.description.as_deref(), current_description, false))
        .flatten();

    let force_cover = options.cover_image_mode == CoverImageMode::Binary;
    let cover_image_url = eligible(options.update_cover_images, options.only_missing, current_cover)
        .then(|| proposed(candidate.cover_image_url.as_deref(), current_cover, force_cover))
        .flatten();

    if title.is_none() && description.is_none() && cover_image_url.is_none() {
        return None;
    }

    Some(ChangeSet {
        title,
        description,
        cover_image_url,
        provider: candidate.provider,
        source: candidate.source.clone(),
        cover_uploaded: false,
    })
}
