//! Season and episode number extraction.
//!
//! The structured subtitle hint (`S01E01`, `Season 1`) is authoritative.
//! Display titles are only parsed when the hint is absent or unreadable,
//! since they come in far more shapes.

use once_cell::sync::Lazy;
use regex::Regex;

static SXXEYY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bS(\d{1,3})\s*[._-]?\s*E(\d{1,4})\b").expect("SxxEyy regex should compile")
});
static NXNN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})x(\d{2,3})\b").expect("NxNN regex should compile")
});
static SEASON_EPISODE_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bSeason\s*(\d{1,3})(?:\s*[,:-]?\s*(?:Episode|Ep\.?)\s*(\d{1,4}))?\b")
        .expect("season words regex should compile")
});
static SEASON_ONLY_SHORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*S(\d{1,3})\s*$").expect("short season regex should compile"));

/// Position of a season or episode inside its series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeRef {
    pub season: u32,
    /// `None` when only the season is known.
    pub episode: Option<u32>,
}

impl EpisodeRef {
    fn season(season: u32) -> Self {
        Self {
            season,
            episode: None,
        }
    }

    fn episode(season: u32, episode: u32) -> Self {
        Self {
            season,
            episode: Some(episode),
        }
    }
}

/// Parse a season/episode reference out of free text.
///
/// Recognizes `S02E01`, `s2 e1`, `2x01`, `Season 2`, `Season 2, Episode 1`
/// and a bare `S2`.
pub fn parse_episode_ref(text: &str) -> Option<EpisodeRef> {
    if let Some(c) = SXXEYY.captures(text) {
        return Some(EpisodeRef::episode(c[1].parse().ok()?, c[2].parse().ok()?));
    }
    if let Some(c) = SEASON_EPISODE_WORDS.captures(text) {
        let season = c[1].parse().ok()?;
        return Some(match c.get(2).and_then(|m| m.as_str().parse().ok()) {
            Some(episode) => EpisodeRef::episode(season, episode),
            None => EpisodeRef::season(season),
        });
    }
    if let Some(c) = NXNN.captures(text) {
        return Some(EpisodeRef::episode(c[1].parse().ok()?, c[2].parse().ok()?));
    }
    if let Some(c) = SEASON_ONLY_SHORT.captures(text) {
        return Some(EpisodeRef::season(c[1].parse().ok()?));
    }
    None
}

/// Locate a record inside its series: subtitle hint first, display title as
/// a fallback.
pub fn locate(subtitle: Option<&str>, display_name: &str) -> Option<EpisodeRef> {
    subtitle
        .and_then(parse_episode_ref)
        .or_else(|| parse_episode_ref(display_name))
}
