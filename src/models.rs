//! Core data models for playlist-to-library matching.
//!
//! This module contains the struct definitions, type aliases, and enums
//! shared by the indexer, the resolver and the report writers.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

// ============================================================================
// Type Aliases
// ============================================================================

/// Position of a file in discovery order. Lower = found earlier in the walk.
pub type FileId = usize;

/// Position of a key in first-insertion order.
pub type EntryId = usize;

/// Index mapping a normalized key to its entry in `LibraryIndex::entries`
pub type KeyLookup = FxHashMap<NormalizedKey, EntryId>;

/// Artist-only index for bounding the artist-scoped scans
pub type ArtistBuckets = FxHashMap<Arc<str>, Vec<EntryId>>;

// ============================================================================
// String Interning
// ============================================================================

/// String interner for deduplicating normalized key components.
/// Every file registers 2-8 keys that repeat the same artist and album,
/// so sharing them keeps the index footprint close to one copy per folder.
pub struct StringInterner {
    strings: FxHashMap<Arc<str>, Arc<str>>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            strings: FxHashMap::default(),
        }
    }

    /// Intern a string, returning a reference-counted handle.
    /// If the string was seen before, returns the existing Arc.
    pub fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing);
        }
        let arc: Arc<str> = Arc::from(s);
        self.strings.insert(Arc::clone(&arc), Arc::clone(&arc));
        arc
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Library Models
// ============================================================================

/// (artist, album, track) in normalized form. Derived, never identity:
/// one file is registered under several of these.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NormalizedKey {
    pub artist: Arc<str>,
    pub album: Arc<str>,
    pub track: Arc<str>,
}

impl NormalizedKey {
    /// Build a lookup key from borrowed parts (allocates; lookups are few per track).
    pub fn new(artist: &str, album: &str, track: &str) -> Self {
        Self {
            artist: Arc::from(artist),
            album: Arc::from(album),
            track: Arc::from(track),
        }
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?}, {:?})", self.artist, self.album, self.track)
    }
}

/// One indexed audio file with the raw path components it was keyed from.
#[derive(Clone, Debug)]
pub struct LibraryFile {
    pub path: PathBuf,
    pub artist: String, // grandparent directory name
    pub album: String,  // parent directory name
    pub stem: String,   // file name without extension
}

/// A key with the files registered under it, in discovery order.
#[derive(Clone, Debug)]
pub struct IndexEntry {
    pub key: NormalizedKey,
    pub files: Vec<FileId>,
}

/// Counters collected while walking the library.
#[derive(Clone, Debug, Default, Serialize)]
pub struct IndexStats {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub skipped_extension: usize,
    pub skipped_shallow: usize, // fewer than two directories below the root
    pub skipped_non_utf8: usize,
    pub walk_errors: usize,
    pub keys: usize,
    pub artists: usize,
}

// ============================================================================
// Playlist Models
// ============================================================================

/// One track the caller wants to find in the library.
/// Accepts the scraper's field names ("song", "release") as aliases.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredTrack {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub artist: String,
    #[serde(default, alias = "song", deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, alias = "release", deserialize_with = "null_as_empty")]
    pub album: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub time: String,
}

impl DesiredTrack {
    pub fn new(artist: &str, title: &str, album: &str) -> Self {
        Self {
            artist: artist.to_string(),
            title: title.to_string(),
            album: album.to_string(),
            time: String::new(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Match Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Found,
    Missing,
}

/// Cascade step that produced a match, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Exact,
    FlexibleAlbum,
    ExtractedTitle,
    TokenSubset,
    ParentheticalStripped,
    ArtistOnly,
    Compilation,
}

impl Strategy {
    pub const ALL: [Strategy; 7] = [
        Strategy::Exact,
        Strategy::FlexibleAlbum,
        Strategy::ExtractedTitle,
        Strategy::TokenSubset,
        Strategy::ParentheticalStripped,
        Strategy::ArtistOnly,
        Strategy::Compilation,
    ];

    /// 1-based position in the cascade
    pub fn step(self) -> usize {
        self as usize + 1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Exact => "exact",
            Strategy::FlexibleAlbum => "flexible_album",
            Strategy::ExtractedTitle => "extracted_title",
            Strategy::TokenSubset => "token_subset",
            Strategy::ParentheticalStripped => "parenthetical_stripped",
            Strategy::ArtistOnly => "artist_only",
            Strategy::Compilation => "compilation",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Verdict for one desired track.
/// `status == Found` iff `matched_paths` is non-empty iff `strategy` is set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    pub status: MatchStatus,
    pub strategy: Option<Strategy>,
    pub matched_paths: Vec<PathBuf>,
    pub candidate_paths: Vec<PathBuf>, // only filled when Missing and candidates are enabled
}

impl MatchResult {
    pub fn found(strategy: Strategy, matched_paths: Vec<PathBuf>) -> Self {
        debug_assert!(!matched_paths.is_empty());
        Self {
            status: MatchStatus::Found,
            strategy: Some(strategy),
            matched_paths,
            candidate_paths: Vec::new(),
        }
    }

    pub fn missing(candidate_paths: Vec<PathBuf>) -> Self {
        Self {
            status: MatchStatus::Missing,
            strategy: None,
            matched_paths: Vec::new(),
            candidate_paths,
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == MatchStatus::Found
    }
}
