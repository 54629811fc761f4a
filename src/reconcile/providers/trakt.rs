//! Trakt placeholder.
//!
//! Trakt can be listed in the preferred sources and its identifiers are
//! extracted, but no client exists yet. Every lookup reports
//! [`AdapterError::NotImplemented`] so the resolver moves on to the next
//! provider.

use async_trait::async_trait;
use mediasync_common::{MediaType, Provider};

use crate::reconcile::provider::{AdapterError, CatalogAdapter, Lookup};
use crate::store::MediaRecord;

#[derive(Debug, Default)]
pub struct TraktAdapter;

impl TraktAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CatalogAdapter for TraktAdapter {
    fn provider(&self) -> Provider {
        Provider::Trakt
    }

    async fn fetch_by_id(
        &self,
        _id: &str,
        _media_type: MediaType,
        _hint: &MediaRecord,
    ) -> Result<Lookup, AdapterError> {
        Err(AdapterError::NotImplemented(Provider::Trakt))
    }

    async fn search_by_title(&self, _title: &str, _media_type: MediaType) -> Result<Lookup, AdapterError> {
        Err(AdapterError::NotImplemented(Provider::Trakt))
    }

    async fn resolve_sub_resource(&self, _record: &MediaRecord) -> Result<Lookup, AdapterError> {
        Err(AdapterError::NotImplemented(Provider::Trakt))
    }
}
