//! REST client for a remote content repository.
//!
//! Endpoints, relative to the configured base URL:
//!
//! - `GET    /records/{id}` -- read a record
//! - `PATCH  /records/{id}` -- apply a [`RecordPatch`]
//! - `PUT    /records/{id}/cover` -- upload a binary cover image
//! - `GET    /settings/providers/{provider}` -- `{"api_key": "..."}`

use std::time::Duration;

use async_trait::async_trait;
use mediasync_common::{Provider, RecordId};
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::{ContentStore, CoverBlob, MediaRecord, RecordPatch, StoreError};

#[derive(Debug, Deserialize)]
struct ProviderSettings {
    api_key: Option<String>,
}

/// [`ContentStore`] backed by a remote HTTP API.
pub struct HttpStore {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpStore {
    /// Create a client for the store at `base_url`, authenticating with an
    /// optional bearer token.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Transport(format!("invalid store base URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Transport(format!("invalid store base URL {base_url}")));
        }

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, StoreError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))
    }
}

/// Map a non-success status to a store error.
async fn check(id: &RecordId, resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound(id.clone()));
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Rejected {
        id: id.clone(),
        reason: format!("HTTP {status}: {body}"),
    })
}

#[async_trait]
impl ContentStore for HttpStore {
    async fn read(&self, id: &RecordId) -> Result<MediaRecord, StoreError> {
        let url = self.url(&["records", id.as_str()]);
        debug!(url = %url, "Store read");

        let resp = self.send(self.client.get(url)).await?;
        check(id, resp)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Transport(format!("failed to decode record {id}: {e}")))
    }

    async fn update(&self, id: &RecordId, patch: &RecordPatch) -> Result<MediaRecord, StoreError> {
        let url = self.url(&["records", id.as_str()]);
        debug!(url = %url, "Store update");

        let resp = self.send(self.client.patch(url).json(patch)).await?;
        check(id, resp)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Transport(format!("failed to decode record {id}: {e}")))
    }

    async fn put_binary(&self, id: &RecordId, blob: CoverBlob) -> Result<(), StoreError> {
        let url = self.url(&["records", id.as_str(), "cover"]);
        debug!(url = %url, bytes = blob.data.len(), hash = %blob.hash, "Store cover upload");

        let request = self
            .client
            .put(url)
            .header(CONTENT_TYPE, blob.content_type)
            .body(blob.data);
        let resp = self.send(request).await?;
        check(id, resp).await?;
        Ok(())
    }

    async fn provider_key(&self, provider: Provider) -> Result<Option<String>, StoreError> {
        let name = provider.to_string();
        let url = self.url(&["settings", "providers", name.as_str()]);
        let resp = self.send(self.client.get(url)).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(StoreError::Transport(format!(
                "provider settings for {provider} returned HTTP {}",
                resp.status()
            )));
        }

        let settings: ProviderSettings = resp
            .json()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(settings.api_key.filter(|k| !k.is_empty()))
    }
}
