//! Title matching between a catalog candidate and the record being enriched.
//!
//! A candidate is accepted when the first of these rules holds:
//!
//! 1. the titles are equal, ignoring case;
//! 2. the expected title contains the candidate title;
//! 3. the expected title's prefix before its first colon equals the candidate;
//! 4. the titles are equal once a trailing `(YYYY)` is removed from both.
//!
//! A rejection is a miss, never an error.

use once_cell::sync::Lazy;
use regex::Regex;

static TRAILING_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)\s*\((\d{4})\)\s*$").expect("trailing year regex should compile")
});

/// Split `"Dune (2021)"` into `("Dune", Some(2021))`. Titles without a
/// trailing year come back trimmed and unchanged.
pub fn split_trailing_year(title: &str) -> (&str, Option<u16>) {
    match TRAILING_YEAR.captures(title) {
        Some(c) => {
            let base = c.get(1).map_or("", |m| m.as_str()).trim();
            (base, c[2].parse().ok())
        }
        None => (title.trim(), None),
    }
}

/// The part of a title before its first colon, if it has one.
pub fn colon_prefix(title: &str) -> Option<&str> {
    title
        .split_once(':')
        .map(|(prefix, _)| prefix.trim())
        .filter(|p| !p.is_empty())
}

/// Decide whether `candidate` names the same thing as `expected`.
pub fn titles_match(candidate: &str, expected: &str) -> bool {
    let candidate_norm = candidate.trim().to_lowercase();
    let expected_norm = expected.trim().to_lowercase();

    if candidate_norm == expected_norm {
        return !candidate.is_empty();
    }

    if candidate_norm.is_empty() || expected_norm.is_empty() {
        return false;
    }

    if expected_norm.contains(&candidate_norm) {
        return true;
    }

    if colon_prefix(&expected_norm) == Some(candidate_norm.as_str()) {
        return true;
    }

    let (candidate_base, _) = split_trailing_year(&candidate_norm);
    let (expected_base, _) = split_trailing_year(&expected_norm);
    !candidate_base.is_empty() && candidate_base == expected_base
}
