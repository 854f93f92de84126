//! Genre/level classification of a track.
//!
//! Maps a [`MetadataView`] to the two directory segments a track is filed
//! under: the first listed genre and a level token (`l3`, `l2-l4`) found in
//! the free-text comment.

use regex::Regex;
use std::sync::LazyLock;

use crate::metadata::MetadataView;

/// Fallback for a missing genre and for a comment without a level token.
pub const UNKNOWN: &str = "Unknown";

/// Level used when there is no metadata at all.
pub const NO_LEVEL: &str = "l0";

static LEVEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^l[0-9]$").expect("valid level regex"));
static LEVEL_RANGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^l[0-9]-l[0-9]$").expect("valid level range regex"));

/// Where a track belongs, before any path sanitizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub genre: String,
    pub level: String,
}

impl Classification {
    pub fn new(genre: impl Into<String>, level: impl Into<String>) -> Self {
        Self {
            genre: genre.into(),
            level: level.into(),
        }
    }
}

/// Classify a track. Never fails: missing fields fall back to
/// [`UNKNOWN`], and no metadata at all gives `Unknown`/[`NO_LEVEL`].
pub fn classify(metadata: Option<&MetadataView>) -> Classification {
    let Some(view) = metadata else {
        return Classification::new(UNKNOWN, NO_LEVEL);
    };

    let backend = view.backend();
    let genre = view
        .first_of(backend.genre_keys())
        .map(primary_genre)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let level = match view.first_of(backend.comment_keys()) {
        Some(comment) => extract_level(comment),
        None => {
            tracing::debug!("No comment field, level unknown");
            UNKNOWN.to_string()
        }
    };

    Classification { genre, level }
}

/// Title-case and trim a raw genre value, then keep the first of several
/// genres separated by `/` or `,`.
pub fn primary_genre(raw: &str) -> String {
    let normalized = title_case(raw).trim().replace('/', ",");
    match normalized.split_once(',') {
        Some((first, _)) => first.trim().to_string(),
        None => normalized,
    }
}

/// Find the first comma-separated token that is a level (`l3`) or a level
/// range (`l2-l4`). Returns [`UNKNOWN`] when no token matches.
pub fn extract_level(comment: &str) -> String {
    comment
        .split(',')
        .map(str::trim)
        .find(|token| LEVEL_REGEX.is_match(token) || LEVEL_RANGE_REGEX.is_match(token))
        .map(str::to_owned)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Upper-case the first letter of every run of letters and lower-case the
/// rest, so `hip-hop` becomes `Hip-Hop` and `ROCK` becomes `Rock`.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_word = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
