//! Extraction of catalog identifiers from a record's external link blob.
//!
//! The blob is whatever the content store holds: usually a JSON object such as
//! `{"imdb": "tt1160419", "tmdb": 438631}`, but older records carry free text
//! with catalog URLs pasted in. Extraction never fails; anything that cannot
//! be read is simply absent from the result.

use mediasync_common::Provider;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

static IMDB_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(tt\d+)\b").expect("imdb id regex should compile"));
static IMDB_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"imdb\.com/title/(tt\d+)").expect("imdb url regex should compile")
});
static IMDB_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(tt\d{7,})\b").expect("bare imdb regex should compile"));
static TMDB_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"themoviedb\.org/(?:movie|tv)/(\d+)").expect("tmdb url regex should compile")
});
static TRAKT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"trakt\.tv/(?:movies|shows)/([A-Za-z0-9-]+)").expect("trakt url regex should compile")
});
static TVDB_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"thetvdb\.com/(?:series/([A-Za-z0-9-]+)|\?[^\s]*?\bid=(\d+))")
        .expect("tvdb url regex should compile")
});

/// Normalized catalog identifiers for one record. Recomputed on every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExternalIdentifierSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imdb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trakt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvdb: Option<String>,
}

impl ExternalIdentifierSet {
    /// True when no identifier was found.
    pub fn is_empty(&self) -> bool {
        self.imdb.is_none() && self.tmdb.is_none() && self.trakt.is_none() && self.tvdb.is_none()
    }

    /// The identifier a provider is queried with: OMDb takes IMDb ids, the
    /// others take their own.
    pub fn for_provider(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Omdb => self.imdb.as_deref(),
            Provider::Tmdb => self.tmdb.as_deref(),
            Provider::Trakt => self.trakt.as_deref(),
        }
    }
}

/// Parse an external link blob into an identifier set.
pub fn extract_identifiers(blob: &str) -> ExternalIdentifierSet {
    match serde_json::from_str::<Value>(blob) {
        Ok(Value::Object(map)) => from_json(&map),
        _ => from_text(blob),
    }
}

fn from_json(map: &Map<String, Value>) -> ExternalIdentifierSet {
    ExternalIdentifierSet {
        imdb: json_field(map, "imdb").and_then(|v| normalize_imdb(&v)),
        tmdb: json_field(map, "tmdb"),
        trakt: json_field(map, "trakt"),
        tvdb: json_field(map, "tvdb"),
    }
}

/// Read `key` (or `key_id`) as a non-empty string, coercing scalars.
fn json_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    let value = map.get(key).or_else(|| map.get(&format!("{key}_id")))?;
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Reduce an IMDb value (bare id or URL) to its canonical `tt\d+` form.
pub fn normalize_imdb(value: &str) -> Option<String> {
    IMDB_ID.captures(value).map(|c| c[1].to_string())
}

fn from_text(text: &str) -> ExternalIdentifierSet {
    let capture = |re: &Regex| re.captures(text).map(|c| c[1].to_string());

    let tvdb = TVDB_URL.captures(text).and_then(|c| {
        c.get(1)
            .or_else(|| c.get(2))
            .map(|m| m.as_str().to_string())
    });

    ExternalIdentifierSet {
        imdb: capture(&IMDB_URL).or_else(|| capture(&IMDB_BARE)),
        tmdb: capture(&TMDB_URL),
        trakt: capture(&TRAKT_URL),
        tvdb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_with_all_keys() {
        let ids = extract_identifiers(
            r#"{"imdb": "tt1160419", "tmdb": 438631, "trakt": "dune-2021", "tvdb": null}"#,
        );
        assert_eq!(ids.imdb.as_deref(), Some("tt1160419"));
        assert_eq!(ids.tmdb.as_deref(), Some("438631"));
        assert_eq!(ids.trakt.as_deref(), Some("dune-2021"));
        assert_eq!(ids.tvdb, None);
    }

    #[test]
    fn json_imdb_url_is_normalized() {
        let ids = extract_identifiers(r#"{"imdb": "https://www.imdb.com/title/tt0903747/"}"#);
        assert_eq!(ids.imdb.as_deref(), Some("tt0903747"));
    }

    #[test]
    fn json_imdb_without_id_is_dropped() {
        let ids = extract_identifiers(r#"{"imdb": "unknown", "tmdb": ""}"#);
        assert!(ids.is_empty());
    }

    #[test]
    fn json_id_suffixed_keys() {
        let ids = extract_identifiers(r#"{"imdb_id": "tt0111161", "tvdb_id": 81189}"#);
        assert_eq!(ids.imdb.as_deref(), Some("tt0111161"));
        assert_eq!(ids.tvdb.as_deref(), Some("81189"));
    }

    #[test]
    fn json_non_scalar_values_are_ignored() {
        let ids = extract_identifiers(r#"{"tmdb": [1, 2], "trakt": {"slug": "x"}}"#);
        assert!(ids.is_empty());
    }

    #[test]
    fn free_text_urls() {
        let ids = extract_identifiers(
            "IMDb: https://www.imdb.com/title/tt0903747/ \
             TMDB: https://www.themoviedb.org/tv/1396-breaking-bad \
             Trakt: https://trakt.tv/shows/breaking-bad \
             TVDB: https://thetvdb.com/series/breaking-bad",
        );
        assert_eq!(ids.imdb.as_deref(), Some("tt0903747"));
        assert_eq!(ids.tmdb.as_deref(), Some("1396"));
        assert_eq!(ids.trakt.as_deref(), Some("breaking-bad"));
        assert_eq!(ids.tvdb.as_deref(), Some("breaking-bad"));
    }

    #[test]
    fn free_text_legacy_tvdb_url() {
        let ids = extract_identifiers("https://thetvdb.com/?tab=series&id=81189");
        assert_eq!(ids.tvdb.as_deref(), Some("81189"));
    }

    #[test]
    fn free_text_bare_imdb_id() {
        let ids = extract_identifiers("see tt1160419 for details");
        assert_eq!(ids.imdb.as_deref(), Some("tt1160419"));
    }

    #[test]
    fn non_object_json_falls_back_to_text() {
        let ids = extract_identifiers(r#""https://www.themoviedb.org/movie/438631""#);
        assert_eq!(ids.tmdb.as_deref(), Some("438631"));
    }

    #[test]
    fn garbage_yields_empty_set() {
        assert!(extract_identifiers("").is_empty());
        assert!(extract_identifiers("{not json").is_empty());
        assert!(extract_identifiers("no links here").is_empty());
    }

    #[test]
    fn provider_identifier_mapping() {
        let ids = extract_identifiers(r#"{"imdb": "tt1", "tmdb": "2", "trakt": "three"}"#);
        assert_eq!(ids.for_provider(Provider::Omdb), Some("tt1"));
        assert_eq!(ids.for_provider(Provider::Tmdb), Some("2"));
        assert_eq!(ids.for_provider(Provider::Trakt), Some("three"));
    }
}
