//! Content store collaborator.
//!
//! The engine never owns media records. It reads them from, and writes partial
//! updates back to, an external content repository through the
//! [`ContentStore`] trait. Two implementations ship with the crate:
//!
//! - [`HttpStore`] -- REST client for a remote content repository.
//! - [`MemoryStore`] -- in-process store, optionally backed by a JSON file.

mod http;
mod memory;

pub use http::HttpStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use bytes::Bytes;
use mediasync_common::{MediaType, Provider, RecordId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a content store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists with the given id.
    #[error("Record not found: {0}")]
    NotFound(RecordId),

    /// The store could not be reached or returned garbage.
    #[error("Store request failed: {0}")]
    Transport(String),

    /// The store refused the write.
    #[error("Store rejected write to {id}: {reason}")]
    Rejected { id: RecordId, reason: String },
}

/// A media record as persisted by the content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Store identity.
    pub id: RecordId,
    /// The title currently rendered for this record.
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub media_type: MediaType,
    /// Opaque external link blob: a JSON map of provider to id, or free text
    /// containing catalog URLs.
    #[serde(default)]
    pub external_links: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    /// Structured season/episode hint such as `S01E01` or `Season 1`.
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Clean show or movie title, distinct from `display_name`.
    #[serde(default)]
    pub title: Option<String>,
}

impl MediaRecord {
    /// Create a record with only the required fields set.
    pub fn new(id: impl Into<RecordId>, display_name: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: None,
            media_type,
            external_links: None,
            cover_image_url: None,
            subtitle: None,
            title: None,
        }
    }

    /// The title used for catalog searches: the clean title when present,
    /// the display name otherwise.
    pub fn search_title(&self) -> &str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.display_name)
    }
}

/// Partial update sent to [`ContentStore::update`]. `None` fields are left
/// untouched by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
}

impl RecordPatch {
    /// True when the patch would not change anything.
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.description.is_none() && self.cover_image_url.is_none()
    }

    /// Apply this patch to a record in place.
    pub fn apply_to(&self, record: &mut MediaRecord) {
        if let Some(ref name) = self.display_name {
            record.display_name = name.clone();
        }
        if let Some(ref description) = self.description {
            record.description = Some(description.clone());
        }
        if let Some(ref url) = self.cover_image_url {
            record.cover_image_url = Some(url.clone());
        }
    }
}

/// Encoded cover image ready for upload.
#[derive(Debug, Clone)]
pub struct CoverBlob {
    pub data: Bytes,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
    /// Content hash (first 16 hex chars of SHA-256).
    pub hash: String,
}

/// The three record operations the engine uses, plus provider key lookup.
///
/// Authentication and sessions belong to the implementation.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Load a record by id.
    async fn read(&self, id: &RecordId) -> Result<MediaRecord, StoreError>;

    /// Persist a partial update and return the updated record.
    async fn update(&self, id: &RecordId, patch: &RecordPatch) -> Result<MediaRecord, StoreError>;

    /// Attach a binary cover image to a record.
    async fn put_binary(&self, id: &RecordId, blob: CoverBlob) -> Result<(), StoreError>;

    /// Look up the API key configured for a catalog provider.
    ///
    /// Called once per provider request; implementations must not cache on
    /// the engine's behalf.
    async fn provider_key(&self, provider: Provider) -> Result<Option<String>, StoreError>;
}
