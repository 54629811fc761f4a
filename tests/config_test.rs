//! Integration tests for configuration files and the file-backed store.

mod common;

use std::sync::Arc;

use common::TestHarness;
use mediasync::config::{self, StoreKind};
use mediasync::reconcile::{ReconcileOptions, Reconciler};
use mediasync::store::{ContentStore, MemoryStore};
use mediasync_common::{CoverImageMode, Provider, RecordId};
use serde_json::json;

// ---------------------------------------------------------------------------
// Config files
// ---------------------------------------------------------------------------

#[test]
fn load_full_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mediasync.toml");
    std::fs::write(
        &path,
        r#"
        [store]
        kind = "file"
        path = "/var/lib/mediasync/records.json"

        [providers.tmdb]
        base_url = "http://tmdb.local/3"
        requests_per_second = 10

        [rate_limit]
        max_attempts = 5
        max_wait_secs = 30

        [batch]
        item_delay_ms = 250

        [cover]
        width = 400
        height = 600
        jpeg_quality = 90

        [defaults]
        only_missing = false
        preferred_sources = ["tmdb"]
        cover_image_mode = "binary"
        "#,
    )
    .unwrap();

    let config = config::load_config_or_default(Some(&path)).unwrap();

    assert_eq!(config.store.kind, StoreKind::File);
    assert_eq!(config.providers.tmdb.base_url, "http://tmdb.local/3");
    assert_eq!(config.providers.tmdb.requests_per_second, 10);
    assert_eq!(config.providers.omdb.base_url, "https://www.omdbapi.com");
    assert_eq!(config.rate_limit.max_attempts, 5);
    assert_eq!(config.batch.item_delay_ms, 250);
    assert_eq!((config.cover.width, config.cover.height), (400, 600));
    assert!(!config.defaults.only_missing);
    assert!(config.defaults.update_titles);
    assert_eq!(config.defaults.preferred_sources, vec![Provider::Tmdb]);
    assert_eq!(config.defaults.cover_image_mode, CoverImageMode::Binary);
}

#[test]
fn invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");

    std::fs::write(&path, "[store]\nbase_url = \"http://store.local\"\n\n[rate_limit]\nmax_attempts = 0\n").unwrap();
    assert!(config::load_config(&path).is_err());

    std::fs::write(&path, "[store]\nkind = \"http\"\n").unwrap();
    assert!(config::load_config(&path).is_err());

    std::fs::write(&path, "[store]\nkind = \"file\"\n").unwrap();
    assert!(config::load_config(&path).is_err());

    std::fs::write(&path, "[defaults]\npreferred_sources = [\"imdb\"]\n").unwrap();
    assert!(config::load_config(&path).is_err());

    assert!(config::load_config(&dir.path().join("missing.toml")).is_err());
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn commit_writes_back_to_record_file() {
    let h = TestHarness::new().await;
    h.mount_tmdb_movie(1, "Dune", "Spice.").await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    std::fs::write(
        &path,
        serde_json::to_string_pretty(&json!({
            "records": [{
                "id": "r1",
                "display_name": "Dune",
                "media_type": "movie",
                "external_links": "https://www.themoviedb.org/movie/1-dune"
            }],
            "provider_keys": { "tmdb": "tmdb-key" }
        }))
        .unwrap(),
    )
    .unwrap();

    let store = Arc::new(MemoryStore::open(&path).unwrap());
    let reconciler = Reconciler::from_config(&h.config, store.clone()).unwrap();
    let record = store.read(&RecordId::from("r1")).await.unwrap();

    let results = reconciler
        .process_bulk_update(&[record], &ReconcileOptions::default(), |_| {}, false)
        .await;
    assert!(results[0].has_changes);

    let reopened = MemoryStore::open(&path).unwrap();
    let stored = reopened.read(&RecordId::from("r1")).await.unwrap();
    assert_eq!(stored.description.as_deref(), Some("Spice."));
    assert_eq!(stored.cover_image_url, Some(h.poster_url(1)));
    assert_eq!(
        reopened.provider_key(Provider::Tmdb).await.unwrap().as_deref(),
        Some("tmdb-key")
    );
}

#[tokio::test]
async fn binary_commit_writes_cover_beside_record_file() {
    let h = TestHarness::new().await;
    h.mount_tmdb_movie(1, "Dune", "Spice.").await;
    h.mount_poster(1, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    std::fs::write(
        &path,
        serde_json::to_string_pretty(&json!({
            "records": [{
                "id": "r1",
                "display_name": "Dune",
                "media_type": "movie",
                "external_links": "{\"tmdb\": 1}"
            }],
            "provider_keys": { "tmdb": "tmdb-key" }
        }))
        .unwrap(),
    )
    .unwrap();

    let store = Arc::new(MemoryStore::open(&path).unwrap());
    let reconciler = Reconciler::from_config(&h.config, store.clone()).unwrap();
    let record = store.read(&RecordId::from("r1")).await.unwrap();
    let options = ReconcileOptions {
        cover_image_mode: CoverImageMode::Binary,
        ..ReconcileOptions::default()
    };

    let results = reconciler
        .process_bulk_update(&[record], &options, |_| {}, false)
        .await;
    assert!(results[0].change_set.as_ref().unwrap().cover_uploaded);

    let cover = dir.path().join("records.covers").join("r1.jpg");
    let data = std::fs::read(&cover).unwrap();
    let decoded = image::load_from_memory(&data).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (60, 90));

    let reopened = MemoryStore::open(&path).unwrap();
    let stored = reopened.read(&RecordId::from("r1")).await.unwrap();
    assert_eq!(stored.cover_image_url, None);
    assert_eq!(stored.description.as_deref(), Some("Spice."));
}
