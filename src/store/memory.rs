//! In-process content store.
//!
//! Holds records in memory and, when opened from a file, writes every update
//! back to that JSON file. Tests use it directly; the CLI uses it for the
//! `file` store kind.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use mediasync_common::{Provider, RecordId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ContentStore, CoverBlob, MediaRecord, RecordPatch, StoreError};

/// On-disk layout of a file-backed store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    records: Vec<MediaRecord>,
    #[serde(default)]
    provider_keys: HashMap<Provider, String>,
}

#[derive(Default)]
struct Inner {
    records: BTreeMap<RecordId, MediaRecord>,
    provider_keys: HashMap<Provider, String>,
    uploads: Vec<(RecordId, CoverBlob)>,
    update_calls: usize,
    key_lookups: usize,
    failing_updates: HashSet<RecordId>,
}

/// A [`ContentStore`] kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON file. Updates are written back to it.
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read record file: {:?}", path))?;
        let file: StoreFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse record file: {:?}", path))?;

        let inner = Inner {
            records: file
                .records
                .into_iter()
                .map(|r| (r.id.clone(), r))
                .collect(),
            provider_keys: file.provider_keys,
            ..Default::default()
        };

        Ok(Self {
            inner: Mutex::new(inner),
            path: Some(path.to_path_buf()),
        })
    }

    /// Add or replace a record.
    pub fn insert(&self, record: MediaRecord) {
        self.inner.lock().records.insert(record.id.clone(), record);
    }

    /// Configure the API key for a provider.
    pub fn set_provider_key(&self, provider: Provider, key: impl Into<String>) {
        self.inner.lock().provider_keys.insert(provider, key.into());
    }

    /// Make every subsequent `update` of `id` fail with a rejected write.
    pub fn fail_updates_for(&self, id: impl Into<RecordId>) {
        self.inner.lock().failing_updates.insert(id.into());
    }

    /// Current copy of a record, if present.
    pub fn get(&self, id: &RecordId) -> Option<MediaRecord> {
        self.inner.lock().records.get(id).cloned()
    }

    /// Number of `update` calls received, successful or not.
    pub fn update_calls(&self) -> usize {
        self.inner.lock().update_calls
    }

    /// Number of provider key lookups served.
    pub fn key_lookups(&self) -> usize {
        self.inner.lock().key_lookups
    }

    /// Record ids and content hashes of every binary upload, in order.
    pub fn uploads(&self) -> Vec<(RecordId, String)> {
        self.inner
            .lock()
            .uploads
            .iter()
            .map(|(id, blob)| (id.clone(), blob.hash.clone()))
            .collect()
    }

    /// Where a file-backed store keeps the cover of `id`: a JPEG in a
    /// `<records>.covers` directory beside the record file. `None` for
    /// purely in-memory stores.
    pub fn cover_path(&self, id: &RecordId) -> Option<PathBuf> {
        let path = self.path.as_ref()?;
        let file_name: String = id
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        Some(path.with_extension("covers").join(format!("{file_name}.jpg")))
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        let content = {
            let inner = self.inner.lock();
            let file = StoreFile {
                records: inner.records.values().cloned().collect(),
                provider_keys: inner.provider_keys.clone(),
            };
            serde_json::to_string_pretty(&file)
                .map_err(|e| StoreError::Transport(e.to_string()))?
        };

        std::fs::write(path, content).map_err(|e| StoreError::Transport(e.to_string()))
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn read(&self, id: &RecordId) -> Result<MediaRecord, StoreError> {
        self.get(id).ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn update(&self, id: &RecordId, patch: &RecordPatch) -> Result<MediaRecord, StoreError> {
        let updated = {
            let mut inner = self.inner.lock();
            inner.update_calls += 1;

            if inner.failing_updates.contains(id) {
                return Err(StoreError::Rejected {
                    id: id.clone(),
                    reason: "write refused".to_string(),
                });
            }

            let record = inner
                .records
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            patch.apply_to(record);
            record.clone()
        };

        debug!(record_id = %id, "Applied record patch");
        self.persist()?;
        Ok(updated)
    }

    async fn put_binary(&self, id: &RecordId, blob: CoverBlob) -> Result<(), StoreError> {
        if !self.inner.lock().records.contains_key(id) {
            return Err(StoreError::NotFound(id.clone()));
        }

        if let Some(path) = self.cover_path(id) {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir).map_err(|e| StoreError::Transport(e.to_string()))?;
            }
            std::fs::write(&path, &blob.data).map_err(|e| StoreError::Transport(e.to_string()))?;
            debug!(record_id = %id, path = ?path, hash = %blob.hash, "Wrote cover image");
        }

        self.inner.lock().uploads.push((id.clone(), blob));
        Ok(())
    }

    async fn provider_key(&self, provider: Provider) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock();
        inner.key_lookups += 1;
        Ok(inner.provider_keys.get(&provider).cloned())
    }
}
