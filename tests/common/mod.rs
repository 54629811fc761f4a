//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which starts a wiremock server standing in for
//! the OMDb, TMDB and image hosts, and an in-memory content store holding the
//! provider API keys. [`TestHarness::reconciler`] wires the real adapters to
//! both.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use mediasync::config::Config;
use mediasync::reconcile::Reconciler;
use mediasync::store::{MediaRecord, MemoryStore};
use mediasync_common::{MediaType, Provider};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test harness wrapping a mock catalog server and an in-memory store.
pub struct TestHarness {
    pub server: MockServer,
    pub store: Arc<MemoryStore>,
    pub config: Config,
}

impl TestHarness {
    /// Start a mock server and a store with OMDb and TMDB keys configured.
    pub async fn new() -> Self {
        let server = MockServer::start().await;

        let store = Arc::new(MemoryStore::new());
        store.set_provider_key(Provider::Omdb, "omdb-key");
        store.set_provider_key(Provider::Tmdb, "tmdb-key");

        let mut config = Config::default();
        config.providers.omdb.base_url = format!("{}/omdb", server.uri());
        config.providers.tmdb.base_url = format!("{}/tmdb", server.uri());
        config.providers.tmdb.image_base_url = format!("{}/images", server.uri());
        config.providers.tmdb.requests_per_second = 100;
        config.batch.item_delay_ms = 0;
        config.batch.request_timeout_secs = 5;
        config.cover.width = 60;
        config.cover.height = 90;

        Self {
            server,
            store,
            config,
        }
    }

    /// Build a reconciler over the harness store and config.
    pub fn reconciler(&self) -> Arc<Reconciler> {
        let reconciler = Reconciler::from_config(&self.config, self.store.clone())
            .expect("failed to build reconciler");
        Arc::new(reconciler)
    }

    /// Store a movie record linked to a TMDB id and return it.
    pub fn insert_movie(&self, id: &str, display_name: &str, tmdb_id: u64) -> MediaRecord {
        let mut record = MediaRecord::new(id, display_name, MediaType::Movie);
        record.external_links = Some(json!({ "tmdb": tmdb_id }).to_string());
        self.store.insert(record.clone());
        record
    }

    /// Re-read records from the store.
    pub fn reload(&self, records: &[MediaRecord]) -> Vec<MediaRecord> {
        records
            .iter()
            .map(|r| self.store.get(&r.id).expect("record should exist"))
            .collect()
    }

    /// Serve a TMDB movie detail with a poster under the image host.
    pub async fn mount_tmdb_movie(&self, tmdb_id: u64, title: &str, overview: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/tmdb/movie/{tmdb_id}")))
            .and(query_param("api_key", "tmdb-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": tmdb_id,
                "title": title,
                "overview": overview,
                "poster_path": format!("/poster-{tmdb_id}.png"),
                "release_date": "2021-09-15",
                "runtime": 155,
                "genres": [{ "id": 878, "name": "Science Fiction" }]
            })))
            .mount(&self.server)
            .await;
    }

    /// Serve a poster image, expecting exactly `calls` downloads.
    pub async fn mount_poster(&self, tmdb_id: u64, calls: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/images/poster-{tmdb_id}.png")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(120, 80)))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Answer every OMDb request with the daily quota error.
    pub async fn mount_omdb_limit(&self, calls: u64) {
        Mock::given(method("GET"))
            .and(path("/omdb/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": "False",
                "Error": "Request limit reached!"
            })))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Poster URL the TMDB adapter builds for `tmdb_id`.
    pub fn poster_url(&self, tmdb_id: u64) -> String {
        format!("{}/images/poster-{tmdb_id}.png", self.server.uri())
    }
}

/// Encode a solid PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .expect("failed to encode png");
    buf.into_inner()
}
