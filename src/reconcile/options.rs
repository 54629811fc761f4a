//! Per-run reconciliation policy.

use mediasync_common::{CoverImageMode, Provider};
use serde::{Deserialize, Serialize};

/// Update policy for one run. Immutable while a batch is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    #[serde(default = "enabled")]
    pub update_titles: bool,

    #[serde(default = "enabled")]
    pub update_descriptions: bool,

    #[serde(default = "enabled")]
    pub update_cover_images: bool,

    /// Only fill fields that are currently empty (default: true)
    #[serde(default = "enabled")]
    pub only_missing: bool,

    /// Catalogs to consult, most trusted first
    #[serde(default = "default_sources")]
    pub preferred_sources: Vec<Provider>,

    #[serde(default)]
    pub cover_image_mode: CoverImageMode,
}

fn enabled() -> bool {
    true
}

fn default_sources() -> Vec<Provider> {
    Provider::ALL.to_vec()
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            update_titles: true,
            update_descriptions: true,
            update_cover_images: true,
            only_missing: true,
            preferred_sources: default_sources(),
            cover_image_mode: CoverImageMode::Url,
        }
    }
}
