//! Core type definitions for media records and catalog providers.
//!
//! All enums are serialized in lowercase to match the content store and the
//! configuration file.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Error;

/// Kind of media record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// A single movie.
    Movie,
    /// A TV series (show).
    Series,
    /// A season within a series.
    Season,
    /// A single episode within a season.
    Episode,
    /// Anything the store knows that the catalogs do not model.
    #[serde(other)]
    Other,
}

impl MediaType {
    /// Whether records of this type live below a parent series.
    pub fn is_sub_resource(&self) -> bool {
        matches!(self, Self::Season | Self::Episode)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Series => write!(f, "series"),
            Self::Season => write!(f, "season"),
            Self::Episode => write!(f, "episode"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// External metadata catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// The Open Movie Database, keyed by IMDb IDs.
    Omdb,
    /// The Movie Database.
    Tmdb,
    /// Trakt.
    Trakt,
}

impl Provider {
    /// Every provider, in the default preference order.
    pub const ALL: [Provider; 3] = [Provider::Omdb, Provider::Tmdb, Provider::Trakt];

    /// Human-readable name used for source attribution.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Omdb => "OMDb",
            Self::Tmdb => "TMDB",
            Self::Trakt => "Trakt",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Omdb => write!(f, "omdb"),
            Self::Tmdb => write!(f, "tmdb"),
            Self::Trakt => write!(f, "trakt"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "omdb" => Ok(Self::Omdb),
            "tmdb" => Ok(Self::Tmdb),
            "trakt" => Ok(Self::Trakt),
            other => Err(Error::invalid_input(format!("Unknown provider: {other}"))),
        }
    }
}

/// How a new cover image is written back to the content store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverImageMode {
    /// Persist the provider's image URL as-is.
    #[default]
    Url,
    /// Download, resize and upload the image as a binary attachment.
    Binary,
}

impl fmt::Display for CoverImageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url => write!(f, "url"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

impl std::str::FromStr for CoverImageMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "url" => Ok(Self::Url),
            "binary" => Ok(Self::Binary),
            other => Err(Error::invalid_input(format!("Invalid cover image mode: {other}"))),
        }
    }
}
