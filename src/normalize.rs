//! Shared normalization functions for playlist-to-library matching.
//! Used by the indexer (file side) and the resolver (playlist side).
//!
//! CRITICAL: both sides of every lookup go through these functions. Any change
//! here changes which alias keys exist, so run the tests after changes.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Parenthetical featuring credit: "(feat. Someone)", "(featuring X)"
pub static FEAT_PAREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\(feat\.?.*?\)").unwrap());

/// Bracketed featuring credit: "[feat. Someone]"
pub static FEAT_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\[feat\.?.*?\]").unwrap());

/// Trailing featuring credit: "Song feat. Someone Else" → "Song"
pub static FEAT_TRAILING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*feat\.?\s+.*$").unwrap());

/// Release-type suffix on album folders: "Name - Single", "Name - EP"
pub static ALBUM_RELEASE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*-\s*(?:single|ep|album|lp)\s*$").unwrap());

/// Year suffix on album folders: "Name (2023)", "Name [1999]"
pub static ALBUM_YEAR_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[\[(]\d{4}[\])]\s*$").unwrap());

/// Leading track number: "01. Song", "1 Song". Requires whitespace so "1999" survives.
pub static TRACK_NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.?\s+").unwrap());

/// Hyphen, en-dash or em-dash used between artist and title.
pub static DASH_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[-–—]\s*").unwrap());

/// Parenthetical group: "(2020 Remaster)"
pub static PAREN_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)\s*").unwrap());

/// Bracketed group: "[Live]"
pub static BRACKET_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\[[^\]]*\]\s*").unwrap());

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize metadata text into the canonical comparison form.
///
/// NFKD, lowercase, drop featuring credits, `&` → `and`, keep only ASCII
/// letters/digits/whitespace, collapse whitespace. Total: empty in, empty out.
///
/// e.g., "Beyoncé & Jay-Z (feat. X)" → "beyonce and jayz"
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lowered = text.nfkd().collect::<String>().to_lowercase();

    let mut result = FEAT_PAREN.replace_all(&lowered, "").into_owned();
    result = FEAT_BRACKET.replace_all(&result, "").into_owned();
    result = FEAT_TRAILING.replace_all(&result, "").into_owned();
    result = result.replace('&', "and");

    // Combining marks left over from NFKD fall out here too
    let kept: String = result
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();
    let collapsed = collapse_whitespace(&kept);

    // Punctuation removal can expose a "feat <rest>" tail ("x feat! y"),
    // strip it again so the output is a fixed point.
    FEAT_TRAILING.replace(&collapsed, "").trim().to_string()
}

/// Normalize an album name, tolerating release-type and year suffixes.
/// Must see the raw album string: the suffix patterns need the punctuation.
///
/// e.g., "Greatest Hits - EP" → "greatest hits", "Abbey Road (1969)" → "abbey road"
pub fn normalize_album(album: &str) -> String {
    if album.is_empty() {
        return String::new();
    }

    let result = ALBUM_RELEASE_SUFFIX.replace(album, "");
    let result = ALBUM_YEAR_SUFFIX.replace(&result, "");
    normalize(&result)
}

/// Extract a bare track title from a filename stem (or a playlist title) that
/// may carry a track number and/or an artist prefix.
///
/// e.g., "02. Song" → "song", "Artist - Song" with artist "Artist" → "song",
///       "Other - Song" with artist "Artist" → "song"
pub fn extract_track_name(stem: &str, artist: &str) -> String {
    let artist_norm = normalize(artist);

    let cleaned = TRACK_NUMBER_PREFIX.replace(stem, "");
    let stem_norm = normalize(&cleaned);

    if let Some(rest) = stem_norm.strip_prefix(artist_norm.as_str()) {
        let rest = rest.trim().trim_start_matches(|c: char| c == '-' || c.is_whitespace());
        if !rest.is_empty() {
            return rest.to_string();
        }
    }

    // Split on the raw stem: normalization already removed the dashes
    let parts: Vec<&str> = DASH_SEPARATOR.split(&cleaned).collect();
    if parts.len() > 1 {
        if normalize(parts[0]) == artist_norm {
            return normalize(&parts[1..].join(" "));
        }
        return normalize(parts[parts.len() - 1]);
    }

    stem_norm
}

/// Remove "(...)" and "[...]" groups from a raw title. Not normalized.
///
/// e.g., "Dancing (2020 Version)" → "Dancing"
pub fn strip_parentheticals(text: &str) -> String {
    let result = PAREN_GROUP.replace_all(text, " ");
    BRACKET_GROUP.replace_all(&result, " ").trim().to_string()
}

/// Word set of an already-normalized string.
pub fn tokens(normalized: &str) -> FxHashSet<&str> {
    normalized.split_whitespace().collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// TESTS
// ============================================================================
