//! TMDB (The Movie Database) adapter.
//!
//! TMDB is hierarchical: movies and shows are top-level resources, seasons
//! and episodes hang below a show. Season and episode numbers are taken from
//! the record's subtitle hint first and from its display name only when the
//! hint is missing or unreadable. When neither yields numbers the lookup falls
//! back to the parent show.
//!
//! Requests are paced client-side with a token bucket ([`governor`]) and
//! HTTP 429 responses are reported as [`Lookup::RateLimited`] with the
//! `Retry-After` value, leaving retries to the rate-limit governor.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use mediasync_common::{MediaType, Provider};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{api_key, http_client, parse_year};
use crate::config::TmdbConfig;
use crate::reconcile::episode::{locate, EpisodeRef};
use crate::reconcile::matching::split_trailing_year;
use crate::reconcile::provider::{is_throttle_status, retry_after, AdapterError, CatalogAdapter, Lookup, UpdateCandidate};
use crate::store::{ContentStore, MediaRecord};

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct SearchResponse<T> {
    #[serde(default)]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct MovieSearchResult {
    title: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TvSearchResult {
    id: u64,
    name: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MovieDetail {
    title: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    release_date: Option<String>,
    runtime: Option<u32>,
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct TvDetail {
    name: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    first_air_date: Option<String>,
    #[serde(default)]
    episode_run_time: Vec<u32>,
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct SeasonDetail {
    name: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodeDetail {
    name: Option<String>,
    overview: Option<String>,
    still_path: Option<String>,
    air_date: Option<String>,
    runtime: Option<u32>,
}

/// A decoded body, or the lookup to report instead.
enum Fetched<T> {
    Body(T),
    Miss(Lookup),
}

macro_rules! body_or_return {
    ($fetched:expr) => {
        match $fetched {
            Fetched::Body(body) => body,
            Fetched::Miss(lookup) => return Ok(lookup),
        }
    };
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Prefer the first result released in `year`, else the first result.
fn pick<T>(results: &[T], year: Option<u16>, date: impl Fn(&T) -> Option<&str>) -> Option<&T> {
    year.and_then(|y| results.iter().find(|r| parse_year(date(r)) == Some(y)))
        .or_else(|| results.first())
}

// ---------------------------------------------------------------------------
// Adapter implementation
// ---------------------------------------------------------------------------

/// TMDB catalog adapter.
pub struct TmdbAdapter {
    client: reqwest::Client,
    base_url: String,
    image_base_url: String,
    store: Arc<dyn ContentStore>,
    rate_limiter: DefaultDirectRateLimiter,
}

impl TmdbAdapter {
    /// Create an adapter paced at `config.requests_per_second`.
    pub fn new(config: &TmdbConfig, store: Arc<dyn ContentStore>, timeout: Duration) -> Result<Self, AdapterError> {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client: http_client(Provider::Tmdb, timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            image_base_url: config.image_base_url.trim_end_matches('/').to_string(),
            store,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    /// Execute a paced GET and decode the body.
    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<Fetched<T>, AdapterError> {
        let key = api_key(self.store.as_ref(), Provider::Tmdb).await?;
        self.rate_limiter.until_ready().await;

        debug!(path, "TMDB request");
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(&[("api_key", key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| AdapterError::Request {
                provider: Provider::Tmdb,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if is_throttle_status(Provider::Tmdb, status.as_u16()) {
            let wait = retry_after(resp.headers());
            warn!(path, retry_after_secs = wait.map(|w| w.as_secs()), "TMDB returned 429");
            return Ok(Fetched::Miss(Lookup::rate_limited(Provider::Tmdb, wait)));
        }
        if !status.is_success() {
            debug!(path, status = %status, "TMDB returned non-success status");
            return Ok(Fetched::Miss(Lookup::NotFound));
        }

        let body = resp.json().await.map_err(|e| AdapterError::Decode {
            provider: Provider::Tmdb,
            message: e.to_string(),
        })?;
        Ok(Fetched::Body(body))
    }

    /// Join an image path fragment onto the configured image base.
    fn image_url(&self, path: Option<String>) -> Option<String> {
        let path = non_empty(path)?;
        if path.starts_with("http://") || path.starts_with("https://") {
            return Some(path);
        }
        let sep = if path.starts_with('/') { "" } else { "/" };
        Some(format!("{}{}{}", self.image_base_url, sep, path))
    }

    fn candidate(
        &self,
        title: Option<String>,
        description: Option<String>,
        image_path: Option<String>,
        release_date: Option<String>,
    ) -> Option<UpdateCandidate> {
        let mut candidate = UpdateCandidate::new(Provider::Tmdb, non_empty(title)?);
        candidate.description = non_empty(description);
        candidate.cover_image_url = self.image_url(image_path);
        candidate.release_date = non_empty(release_date);
        Some(candidate)
    }

    async fn movie(&self, id: &str) -> Result<Lookup, AdapterError> {
        let detail: MovieDetail = body_or_return!(self.get(&format!("/movie/{id}"), &[]).await?);

        Ok(self
            .candidate(detail.title, detail.overview, detail.poster_path, detail.release_date)
            .map(|mut c| {
                c.runtime_minutes = detail.runtime;
                c.genres = detail.genres.into_iter().map(|g| g.name).collect();
                Lookup::Found(c)
            })
            .unwrap_or(Lookup::NotFound))
    }

    async fn show(&self, id: &str) -> Result<Lookup, AdapterError> {
        let detail: TvDetail = body_or_return!(self.get(&format!("/tv/{id}"), &[]).await?);

        Ok(self
            .candidate(detail.name, detail.overview, detail.poster_path, detail.first_air_date)
            .map(|mut c| {
                c.runtime_minutes = detail.episode_run_time.first().copied();
                c.genres = detail.genres.into_iter().map(|g| g.name).collect();
                Lookup::Found(c)
            })
            .unwrap_or(Lookup::NotFound))
    }

    async fn season(&self, show_id: &str, season: u32) -> Result<Lookup, AdapterError> {
        let detail: SeasonDetail = body_or_return!(self.get(&format!("/tv/{show_id}/season/{season}"), &[]).await?);

        Ok(self
            .candidate(detail.name, detail.overview, detail.poster_path, detail.air_date)
            .map(Lookup::Found)
            .unwrap_or(Lookup::NotFound))
    }

    async fn episode(&self, show_id: &str, season: u32, episode: u32) -> Result<Lookup, AdapterError> {
        let path = format!("/tv/{show_id}/season/{season}/episode/{episode}");
        let detail: EpisodeDetail = body_or_return!(self.get(&path, &[]).await?);

        Ok(self
            .candidate(detail.name, detail.overview, detail.still_path, detail.air_date)
            .map(|mut c| {
                c.runtime_minutes = detail.runtime;
                Lookup::Found(c)
            })
            .unwrap_or(Lookup::NotFound))
    }

    /// Fetch the season or episode at `position` below `show_id`, or the show
    /// itself when the position is unknown.
    async fn below_show(
        &self,
        show_id: &str,
        media_type: MediaType,
        position: Option<EpisodeRef>,
    ) -> Result<Lookup, AdapterError> {
        match (media_type, position) {
            (
                MediaType::Episode,
                Some(EpisodeRef {
                    season,
                    episode: Some(episode),
                }),
            ) => self.episode(show_id, season, episode).await,
            (_, Some(position)) => self.season(show_id, position.season).await,
            (_, None) => {
                debug!(show_id, "No season/episode numbers; using parent show");
                self.show(show_id).await
            }
        }
    }

    /// Discover a show id by title. A trailing `(YYYY)` is stripped from the
    /// query and used to prefer the hit that first aired that year.
    async fn find_show(&self, title: &str) -> Result<Fetched<u64>, AdapterError> {
        let (base, year) = split_trailing_year(title);
        if base.is_empty() {
            return Ok(Fetched::Miss(Lookup::NotFound));
        }

        let found: SearchResponse<TvSearchResult> = match self.get("/search/tv", &[("query", base.to_string())]).await? {
            Fetched::Body(body) => body,
            Fetched::Miss(lookup) => return Ok(Fetched::Miss(lookup)),
        };

        Ok(match pick(&found.results, year, |r| r.first_air_date.as_deref()) {
            Some(show) => Fetched::Body(show.id),
            None => Fetched::Miss(Lookup::NotFound),
        })
    }
}

#[async_trait]
impl CatalogAdapter for TmdbAdapter {
    fn provider(&self) -> Provider {
        Provider::Tmdb
    }

    async fn fetch_by_id(
        &self,
        id: &str,
        media_type: MediaType,
        hint: &MediaRecord,
    ) -> Result<Lookup, AdapterError> {
        let id = id.trim();
        match media_type {
            MediaType::Movie | MediaType::Other => self.movie(id).await,
            MediaType::Series => self.show(id).await,
            MediaType::Season | MediaType::Episode => {
                let position = locate(hint.subtitle.as_deref(), &hint.display_name);
                self.below_show(id, media_type, position).await
            }
        }
    }

    async fn search_by_title(&self, title: &str, media_type: MediaType) -> Result<Lookup, AdapterError> {
        let (base, year) = split_trailing_year(title);
        if base.is_empty() {
            return Ok(Lookup::NotFound);
        }
        let query = [("query", base.to_string())];

        let hit = match media_type {
            MediaType::Movie | MediaType::Other => {
                let found: SearchResponse<MovieSearchResult> = body_or_return!(self.get("/search/movie", &query).await?);
                pick(&found.results, year, |r| r.release_date.as_deref()).and_then(|r| {
                    self.candidate(
                        r.title.clone(),
                        r.overview.clone(),
                        r.poster_path.clone(),
                        r.release_date.clone(),
                    )
                })
            }
            MediaType::Series | MediaType::Season | MediaType::Episode => {
                let found: SearchResponse<TvSearchResult> = body_or_return!(self.get("/search/tv", &query).await?);
                pick(&found.results, year, |r| r.first_air_date.as_deref()).and_then(|r| {
                    self.candidate(
                        r.name.clone(),
                        r.overview.clone(),
                        r.poster_path.clone(),
                        r.first_air_date.clone(),
                    )
                })
            }
        };

        Ok(hit.map(Lookup::Found).unwrap_or(Lookup::NotFound))
    }

    async fn resolve_sub_resource(&self, record: &MediaRecord) -> Result<Lookup, AdapterError> {
        if !record.media_type.is_sub_resource() {
            return Ok(Lookup::NotFound);
        }
        let Some(position) = locate(record.subtitle.as_deref(), &record.display_name) else {
            debug!(record_id = %record.id, "No season/episode numbers to resolve");
            return Ok(Lookup::NotFound);
        };

        let show_id = body_or_return!(self.find_show(record.search_title()).await?);
        self.below_show(&show_id.to_string(), record.media_type, Some(position)).await
    }
}
