use mediasync_common::Provider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::reconcile::ReconcileOptions;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub cover: CoverConfig,

    /// Defaults for every run; CLI flags override them per invocation.
    #[serde(default)]
    pub defaults: ReconcileOptions,
}

// ---------------------------------------------------------------------------
// Content store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Remote content repository over HTTP.
    #[default]
    Http,
    /// Local JSON record file.
    File,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    /// Base URL of the content repository API (http stores)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token sent with every store request (http stores)
    #[serde(default)]
    pub token: Option<String>,

    /// Path of the JSON record file (file stores)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Catalog providers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub omdb: OmdbConfig,

    #[serde(default)]
    pub tmdb: TmdbConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OmdbConfig {
    #[serde(default = "default_omdb_url")]
    pub base_url: String,
}

fn default_omdb_url() -> String {
    "https://www.omdbapi.com".to_string()
}

impl Default for OmdbConfig {
    fn default() -> Self {
        Self {
            base_url: default_omdb_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbConfig {
    #[serde(default = "default_tmdb_url")]
    pub base_url: String,

    #[serde(default = "default_tmdb_image_url")]
    pub image_base_url: String,

    /// Client-side request pacing (default: 4 per second)
    #[serde(default = "default_tmdb_rps")]
    pub requests_per_second: u32,
}

fn default_tmdb_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}
fn default_tmdb_image_url() -> String {
    "https://image.tmdb.org/t/p/original".to_string()
}
fn default_tmdb_rps() -> u32 {
    4
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            base_url: default_tmdb_url(),
            image_base_url: default_tmdb_image_url(),
            requests_per_second: default_tmdb_rps(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Attempts per provider call, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Longest backoff worth sleeping through; longer ones skip the provider
    /// for the rest of its window (default: 60)
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Backoff recorded when a provider throttles without a Retry-After
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: BTreeMap<Provider, u64>,

    /// Backoff for providers missing from `backoff_secs` (default: 60)
    #[serde(default = "default_fallback_backoff")]
    pub fallback_backoff_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_max_wait_secs() -> u64 {
    60
}
fn default_backoff_secs() -> BTreeMap<Provider, u64> {
    BTreeMap::from([
        // OMDb quotas are daily.
        (Provider::Omdb, 24 * 60 * 60),
        (Provider::Tmdb, 10),
        (Provider::Trakt, 60),
    ])
}
fn default_fallback_backoff() -> u64 {
    60
}

impl RateLimitConfig {
    /// Default backoff for a throttled provider.
    pub fn backoff_for(&self, provider: Provider) -> Duration {
        let secs = self
            .backoff_secs
            .get(&provider)
            .copied()
            .unwrap_or(self.fallback_backoff_secs);
        Duration::from_secs(secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_wait_secs: default_max_wait_secs(),
            backoff_secs: default_backoff_secs(),
            fallback_backoff_secs: default_fallback_backoff(),
        }
    }
}

// ---------------------------------------------------------------------------
// Batch and cover processing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Pause between records (default: 500ms)
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,

    /// Timeout for every outbound HTTP request (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_item_delay_ms() -> u64 {
    500
}
fn default_request_timeout() -> u64 {
    30
}

impl BatchConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            item_delay_ms: default_item_delay_ms(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoverConfig {
    /// Site cover width in pixels (default: 600)
    #[serde(default = "default_cover_width")]
    pub width: u32,

    /// Site cover height in pixels (default: 900)
    #[serde(default = "default_cover_height")]
    pub height: u32,

    /// JPEG quality, 1-100 (default: 85)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_cover_width() -> u32 {
    600
}
fn default_cover_height() -> u32 {
    900
}
fn default_jpeg_quality() -> u8 {
    85
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            width: default_cover_width(),
            height: default_cover_height(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}
