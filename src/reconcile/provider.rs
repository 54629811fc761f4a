//! Trait definition and types for catalog adapters.
//!
//! Every external catalog is wrapped in a [`CatalogAdapter`] that translates
//! an identifier or a title into a canonical [`UpdateCandidate`]. Adapters
//! answer with a tagged [`Lookup`] so callers can never confuse "no data"
//! with "throttled".

use std::time::Duration;

use async_trait::async_trait;
use mediasync_common::{MediaType, Provider};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{MediaRecord, StoreError};

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// Metadata proposed by one catalog for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCandidate {
    /// Title as the catalog knows it.
    pub title: String,
    /// Synopsis / plot text.
    pub description: Option<String>,
    /// Fully-qualified poster or still URL.
    pub cover_image_url: Option<String>,
    /// Release or air date as reported by the catalog.
    pub release_date: Option<String>,
    /// Runtime in minutes, if known.
    pub runtime_minutes: Option<u32>,
    /// Genre labels.
    pub genres: Vec<String>,
    /// Catalog that produced the candidate.
    pub provider: Provider,
    /// Attribution shown to humans, e.g. `"TMDB"` or `"TMDB (Series Match)"`.
    pub source: String,
}

impl UpdateCandidate {
    /// Create a candidate with only a title, attributed to `provider`.
    pub fn new(provider: Provider, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            cover_image_url: None,
            release_date: None,
            runtime_minutes: None,
            genres: Vec::new(),
            provider,
            source: provider.label().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Lookup results
// ---------------------------------------------------------------------------

/// Throttling reported by a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub provider: Provider,
    /// Explicit wait requested by the catalog (`Retry-After`), if any.
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.retry_after {
            Some(wait) => write!(f, "{} rate limited (retry after {}s)", self.provider.label(), wait.as_secs()),
            None => write!(f, "{} rate limited", self.provider.label()),
        }
    }
}

/// Outcome of a single catalog call.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The catalog returned usable metadata.
    Found(UpdateCandidate),
    /// The catalog has nothing for this query.
    NotFound,
    /// The catalog refused the call because of throttling.
    RateLimited(RateLimitInfo),
}

impl Lookup {
    /// Shorthand for a throttled lookup.
    pub fn rate_limited(provider: Provider, retry_after: Option<Duration>) -> Self {
        Self::RateLimited(RateLimitInfo {
            provider,
            retry_after,
        })
    }
}

/// Failures that are neither "not found" nor throttling.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The provider exists in the ordering but has no working client.
    #[error("{} lookups are not implemented", .0.label())]
    NotImplemented(Provider),

    /// No API key is configured for the provider.
    #[error("No API key configured for {}", .0.label())]
    MissingApiKey(Provider),

    /// Looking up the API key failed.
    #[error("Failed to fetch API key: {0}")]
    KeyLookup(#[from] StoreError),

    /// The HTTP request failed.
    #[error("{provider} request failed: {message}")]
    Request { provider: Provider, message: String },

    /// The response body could not be decoded.
    #[error("{provider} returned an unreadable response: {message}")]
    Decode { provider: Provider, message: String },
}

// ---------------------------------------------------------------------------
// Adapter trait
// ---------------------------------------------------------------------------

/// Async trait implemented by every catalog adapter.
///
/// Adapters are shared behind an `Arc` by the resolver and must be cheap to
/// call repeatedly. Throttling is reported as [`Lookup::RateLimited`]; any
/// other non-success response is [`Lookup::NotFound`].
#[async_trait]
pub trait CatalogAdapter: Send + Sync {
    /// The catalog this adapter talks to.
    fn provider(&self) -> Provider;

    /// Fetch metadata by the catalog's own identifier.
    ///
    /// `hint` is the record being enriched; hierarchical catalogs read its
    /// subtitle and display name to locate seasons and episodes.
    async fn fetch_by_id(
        &self,
        id: &str,
        media_type: MediaType,
        hint: &MediaRecord,
    ) -> Result<Lookup, AdapterError>;

    /// Search the catalog by title.
    async fn search_by_title(&self, title: &str, media_type: MediaType) -> Result<Lookup, AdapterError>;

    /// Locate a season or episode without a known catalog id.
    ///
    /// Flat catalogs have nothing to offer here.
    async fn resolve_sub_resource(&self, _record: &MediaRecord) -> Result<Lookup, AdapterError> {
        Ok(Lookup::NotFound)
    }
}

/// Whether an HTTP status is a throttling response for `provider`.
///
/// OMDb signals throttling in the body of a successful response instead, see
/// the OMDb adapter.
pub fn is_throttle_status(provider: Provider, status: u16) -> bool {
    match provider {
        Provider::Omdb => false,
        Provider::Tmdb => status == 429,
        Provider::Trakt => status == 420 || status == 429,
    }
}

/// Parse a `Retry-After` header given in whole seconds.
pub fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
