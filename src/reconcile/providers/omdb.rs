//! OMDb (Open Movie Database) adapter.
//!
//! OMDb exposes a single endpoint queried either by IMDb id (`?i=tt...`) or
//! by title (`?t=...&y=...&type=movie|series`). It reports every outcome,
//! throttling included, in the body of a `200 OK`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mediasync_common::{MediaType, Provider};
use serde::Deserialize;
use tracing::debug;

use super::{api_key, http_client};
use crate::config::OmdbConfig;
use crate::reconcile::matching::split_trailing_year;
use crate::reconcile::provider::{is_throttle_status, retry_after, AdapterError, CatalogAdapter, Lookup, UpdateCandidate};
use crate::store::{ContentStore, MediaRecord};

/// Error phrases OMDb uses when a key's quota is spent.
const LIMIT_PHRASES: [&str; 2] = ["daily limit exceeded", "request limit reached"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbResponse {
    response: Option<String>,
    error: Option<String>,
    title: Option<String>,
    plot: Option<String>,
    poster: Option<String>,
    released: Option<String>,
    runtime: Option<String>,
    genre: Option<String>,
}

/// Treat OMDb's `"N/A"` placeholder and blank strings as absent.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("N/A"))
}

/// Parse `"148 min"` into minutes.
fn parse_runtime(value: &str) -> Option<u32> {
    value.split_whitespace().next()?.parse().ok()
}

fn is_limit_error(message: &str) -> bool {
    let message = message.to_lowercase();
    LIMIT_PHRASES.iter().any(|p| message.contains(p))
}

/// OMDb only distinguishes movies from series; seasons and episodes are
/// searched as their series.
fn type_param(media_type: MediaType) -> Option<&'static str> {
    match media_type {
        MediaType::Movie => Some("movie"),
        MediaType::Series | MediaType::Season | MediaType::Episode => Some("series"),
        MediaType::Other => None,
    }
}

impl OmdbResponse {
    fn into_lookup(self) -> Lookup {
        if let Some(ref error) = self.error {
            if is_limit_error(error) {
                return Lookup::rate_limited(Provider::Omdb, None);
            }
        }
        if self.response.as_deref().is_some_and(|r| r.eq_ignore_ascii_case("false")) {
            return Lookup::NotFound;
        }

        let Some(title) = present(self.title) else {
            return Lookup::NotFound;
        };

        let mut candidate = UpdateCandidate::new(Provider::Omdb, title);
        candidate.description = present(self.plot);
        candidate.cover_image_url = present(self.poster);
        candidate.release_date = present(self.released);
        candidate.runtime_minutes = present(self.runtime).as_deref().and_then(parse_runtime);
        candidate.genres = present(self.genre)
            .map(|g| {
                g.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Lookup::Found(candidate)
    }
}

/// OMDb catalog adapter.
pub struct OmdbAdapter {
    client: reqwest::Client,
    base_url: String,
    store: Arc<dyn ContentStore>,
}

impl OmdbAdapter {
    pub fn new(config: &OmdbConfig, store: Arc<dyn ContentStore>, timeout: Duration) -> Result<Self, AdapterError> {
        Ok(Self {
            client: http_client(Provider::Omdb, timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            store,
        })
    }

    async fn query(&self, params: &[(&str, String)]) -> Result<Lookup, AdapterError> {
        let key = api_key(self.store.as_ref(), Provider::Omdb).await?;
        debug!(params = ?params, "OMDb request");

        let resp = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[("apikey", key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| AdapterError::Request {
                provider: Provider::Omdb,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if is_throttle_status(Provider::Omdb, status.as_u16()) {
            return Ok(Lookup::rate_limited(Provider::Omdb, retry_after(resp.headers())));
        }
        if !status.is_success() {
            // A spent key is reported as 401 with the quota message in the body.
            let body = resp.text().await.unwrap_or_default();
            if is_limit_error(&body) {
                return Ok(Lookup::rate_limited(Provider::Omdb, None));
            }
            debug!(status = %status, "OMDb returned non-success status");
            return Ok(Lookup::NotFound);
        }

        let body: OmdbResponse = resp.json().await.map_err(|e| AdapterError::Decode {
            provider: Provider::Omdb,
            message: e.to_string(),
        })?;
        Ok(body.into_lookup())
    }
}

#[async_trait]
impl CatalogAdapter for OmdbAdapter {
    fn provider(&self) -> Provider {
        Provider::Omdb
    }

    async fn fetch_by_id(
        &self,
        id: &str,
        _media_type: MediaType,
        _hint: &MediaRecord,
    ) -> Result<Lookup, AdapterError> {
        self.query(&[("i", id.to_string()), ("plot", "full".to_string())]).await
    }

    async fn search_by_title(&self, title: &str, media_type: MediaType) -> Result<Lookup, AdapterError> {
        let (base, year) = split_trailing_year(title);
        if base.is_empty() {
            return Ok(Lookup::NotFound);
        }

        let mut params = vec![("t", base.to_string())];
        if let Some(year) = year {
            params.push(("y", year.to_string()));
        }
        if let Some(kind) = type_param(media_type) {
            params.push(("type", kind.to_string()));
        }
        self.query(&params).await
    }
}
