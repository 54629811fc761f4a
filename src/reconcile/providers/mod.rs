//! Concrete catalog adapters.
//!
//! - [`OmdbAdapter`] -- flat lookups by IMDb id or title.
//! - [`TmdbAdapter`] -- movies, shows, seasons and episodes.
//! - [`TraktAdapter`] -- placeholder that takes part in ordering only.

pub mod omdb;
pub mod tmdb;
pub mod trakt;

pub use omdb::OmdbAdapter;
pub use tmdb::TmdbAdapter;
pub use trakt::TraktAdapter;

use std::time::Duration;

use mediasync_common::Provider;

use super::provider::AdapterError;
use crate::store::ContentStore;

/// Fetch the API key for `provider` from the store. Keys are looked up on
/// every call.
pub(crate) async fn api_key(store: &dyn ContentStore, provider: Provider) -> Result<String, AdapterError> {
    store
        .provider_key(provider)
        .await?
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or(AdapterError::MissingApiKey(provider))
}

/// Build the HTTP client shared by an adapter's requests.
pub(crate) fn http_client(provider: Provider, timeout: Duration) -> Result<reqwest::Client, AdapterError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AdapterError::Request {
            provider,
            message: e.to_string(),
        })
}

/// Extract a four-digit year from a date string like `"2023-04-15"`.
pub(crate) fn parse_year(date: Option<&str>) -> Option<u16> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse::<u16>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn year_parsing() {
        assert_eq!(parse_year(Some("2023-04-15")), Some(2023));
        assert_eq!(parse_year(Some("1999")), Some(1999));
        assert_eq!(parse_year(None), None);
        assert_eq!(parse_year(Some("")), None);
        assert_eq!(parse_year(Some("N/A")), None);
    }

    #[tokio::test]
    async fn blank_key_counts_as_missing() {
        let store = MemoryStore::new();
        store.set_provider_key(Provider::Omdb, "  ");

        let err = api_key(&store, Provider::Omdb).await.unwrap_err();
        assert!(matches!(err, AdapterError::MissingApiKey(Provider::Omdb)));

        let err = api_key(&store, Provider::Tmdb).await.unwrap_err();
        assert!(matches!(err, AdapterError::MissingApiKey(Provider::Tmdb)));

        store.set_provider_key(Provider::Tmdb, "secret");
        assert_eq!(api_key(&store, Provider::Tmdb).await.unwrap(), "secret");
    }
}
