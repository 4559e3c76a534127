//! Resolution cascade.
//!
//! Strategies run in a fixed order and the first one with any hit wins:
//! 1. exact key
//! 2. flexible album (suffixes like "- EP" / "(1999)" removed)
//! 3. extracted title against both album variants
//! 4. token subset / overlap within the album
//! 5. parenthetical-stripped title
//! 6. artist-wide (exact track, then token rules)
//! 7. compilation folders ("Various Artists", "OST", ...)
//!
//! Each step is an exact hash lookup or a scan of one artist's keys, so a
//! miss is cheap and a hit can always be traced back to the step that made it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::ProgressBar;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::index::LibraryIndex;
use crate::models::{DesiredTrack, FileId, IndexEntry, MatchResult, Strategy};
use crate::normalize::{extract_track_name, normalize, normalize_album, strip_parentheticals, tokens};
use crate::progress::log_progress;
use crate::scoring::{
    album_tokens_match, artist_tokens_match, compilation_tokens_match, score_candidates,
};

/// Folder-artist names that hold multi-artist releases, tried in this order.
pub const COMPILATION_ARTISTS: &[&str] = &[
    "various artists",
    "various",
    "va",
    "compilation",
    "compilations",
    "soundtrack",
    "soundtracks",
    "ost",
];

pub const DEFAULT_MAX_CANDIDATES: usize = 5;

#[derive(Clone, Debug)]
pub struct ResolveOptions {
    /// Rank near-miss files for tracks that are not found
    pub include_candidates: bool,
    pub max_candidates: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            include_candidates: true,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

/// Normalized forms of one desired track, computed once per resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackQuery {
    pub artist: String,
    pub album: String,
    pub flexible_album: String,
    pub title: String,
    pub extracted_title: String,
    /// Parenthetical-stripped raw title, when stripping changed anything
    pub stripped_title: Option<String>,
}

impl TrackQuery {
    pub fn new(track: &DesiredTrack) -> Self {
        let stripped = strip_parentheticals(&track.title);
        let stripped_title = (!stripped.is_empty() && stripped != track.title).then_some(stripped);

        Self {
            artist: normalize(&track.artist),
            album: normalize(&track.album),
            flexible_album: normalize_album(&track.album),
            title: normalize(&track.title),
            extracted_title: extract_track_name(&track.title, &track.artist),
            stripped_title,
        }
    }

    /// `[album, flexible_album]` without the empty ones.
    pub fn album_variants(&self) -> impl Iterator<Item = &str> {
        [self.album.as_str(), self.flexible_album.as_str()]
            .into_iter()
            .filter(|v| !v.is_empty())
    }

    fn has_alternate_title(&self) -> bool {
        self.extracted_title != self.title
    }
}

pub struct Resolver<'a> {
    index: &'a LibraryIndex,
    options: ResolveOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a LibraryIndex, options: ResolveOptions) -> Self {
        Self { index, options }
    }

    pub fn index(&self) -> &'a LibraryIndex {
        self.index
    }

    /// Resolve one desired track. Never fails: degenerate input is just a miss.
    pub fn resolve(&self, track: &DesiredTrack) -> MatchResult {
        let query = TrackQuery::new(track);

        for strategy in Strategy::ALL {
            let hits = self.strategy_hits(strategy, &query);
            if !hits.is_empty() {
                debug!(
                    artist = %track.artist,
                    title = %track.title,
                    strategy = %strategy,
                    paths = hits.len(),
                    "Track found"
                );
                return MatchResult::found(strategy, self.paths(&hits));
            }
        }

        debug!(artist = %track.artist, title = %track.title, "Track missing");
        MatchResult::missing(self.candidates(track, &query))
    }

    /// Resolve every track on the rayon pool. Output order equals input order.
    pub fn resolve_all(&self, tracks: &[DesiredTrack], pb: &ProgressBar) -> Vec<MatchResult> {
        let total = tracks.len() as u64;
        let interval = (total / 20).max(1);
        let done = AtomicU64::new(0);

        let results: Vec<MatchResult> = tracks
            .par_iter()
            .map(|track| {
                let result = self.resolve(track);
                pb.inc(1);
                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                log_progress("match", current, total, interval);
                result
            })
            .collect();

        let found = results.iter().filter(|r| r.is_found()).count();
        info!(
            total = results.len(),
            found,
            missing = results.len() - found,
            "Resolution complete"
        );
        results
    }

    /// Unique paths a single strategy yields for `query`, in stable order.
    /// The cascade stops at the first non-empty one; the explain tool runs them all.
    pub fn try_strategy(&self, strategy: Strategy, query: &TrackQuery) -> Vec<PathBuf> {
        self.paths(&self.strategy_hits(strategy, query))
    }

    fn strategy_hits(&self, strategy: Strategy, q: &TrackQuery) -> Vec<FileId> {
        match strategy {
            Strategy::Exact => self.index.lookup(&q.artist, &q.album, &q.title).to_vec(),
            Strategy::FlexibleAlbum => {
                if q.flexible_album == q.album {
                    return Vec::new();
                }
                self.index
                    .lookup(&q.artist, &q.flexible_album, &q.title)
                    .to_vec()
            }
            Strategy::ExtractedTitle => self.album_variant_hits(&q.artist, q),
            Strategy::TokenSubset => self.token_subset_hits(q),
            Strategy::ParentheticalStripped => {
                let Some(stripped) = &q.stripped_title else {
                    return Vec::new();
                };
                let title = normalize(stripped);
                let mut hits = Vec::new();
                for album in q.album_variants() {
                    hits.extend_from_slice(self.index.lookup(&q.artist, album, &title));
                }
                hits
            }
            Strategy::ArtistOnly => {
                let entries: Vec<&IndexEntry> = self.index.entries_for_artist(&q.artist).collect();
                let hits = exact_track_hits(&entries, &q.title);
                if !hits.is_empty() {
                    return hits;
                }
                let title_tokens = tokens(&q.title);
                token_hits(&entries, |track| artist_tokens_match(&title_tokens, track))
            }
            Strategy::Compilation => self.compilation_hits(q),
        }
    }

    /// Title and extracted title under `artist` for each album variant.
    fn album_variant_hits(&self, artist: &str, q: &TrackQuery) -> Vec<FileId> {
        let mut hits = Vec::new();
        for album in q.album_variants() {
            hits.extend_from_slice(self.index.lookup(artist, album, &q.title));
            if q.has_alternate_title() {
                hits.extend_from_slice(self.index.lookup(artist, album, &q.extracted_title));
            }
        }
        hits
    }

    fn token_subset_hits(&self, q: &TrackQuery) -> Vec<FileId> {
        let title_tokens = tokens(&q.title);
        if title_tokens.is_empty() {
            return Vec::new();
        }
        let entries: Vec<&IndexEntry> = self
            .index
            .entries_for_artist(&q.artist)
            .filter(|e| {
                let album = &*e.key.album;
                album == q.album || (!q.flexible_album.is_empty() && album == q.flexible_album)
            })
            .collect();
        token_hits(&entries, |track| album_tokens_match(&title_tokens, track))
    }

    fn compilation_hits(&self, q: &TrackQuery) -> Vec<FileId> {
        let title_tokens = tokens(&q.title);
        for &alias in COMPILATION_ARTISTS {
            let mut hits = self.album_variant_hits(alias, q);
            if hits.is_empty() {
                let entries: Vec<&IndexEntry> = self.index.entries_for_artist(alias).collect();
                hits = exact_track_hits(&entries, &q.title);
                if hits.is_empty() {
                    hits = token_hits(&entries, |track| compilation_tokens_match(&title_tokens, track));
                }
            }
            if !hits.is_empty() {
                return hits;
            }
        }
        Vec::new()
    }

    fn candidates(&self, track: &DesiredTrack, q: &TrackQuery) -> Vec<PathBuf> {
        if !self.options.include_candidates {
            return Vec::new();
        }
        let group: Vec<PathBuf> = self
            .index
            .files_in_group(&q.artist, &q.album)
            .into_iter()
            .map(|id| self.index.path(id).to_path_buf())
            .collect();
        score_candidates(&track.title, &group, self.options.max_candidates)
    }

    /// Map file ids to paths, dropping repeats but keeping first-seen order.
    fn paths(&self, ids: &[FileId]) -> Vec<PathBuf> {
        let mut seen = FxHashSet::default();
        ids.iter()
            .filter(|id| seen.insert(**id))
            .map(|&id| self.index.path(id).to_path_buf())
            .collect()
    }
}

fn exact_track_hits(entries: &[&IndexEntry], title: &str) -> Vec<FileId> {
    entries
        .iter()
        .filter(|e| &*e.key.track == title)
        .flat_map(|e| e.files.iter().copied())
        .collect()
}

fn token_hits<F>(entries: &[&IndexEntry], accept: F) -> Vec<FileId>
where
    F: Fn(&FxHashSet<&str>) -> bool,
{
    entries
        .iter()
        .filter(|e| accept(&tokens(&e.key.track)))
        .flat_map(|e| e.files.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexOptions;
    use crate::models::MatchStatus;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn library(files: &[&str]) -> (TempDir, LibraryIndex) {
        let tmp = TempDir::new().unwrap();
        for rel in files {
            let path = tmp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"").unwrap();
        }
        let index = LibraryIndex::build(tmp.path(), &IndexOptions::default()).unwrap();
        (tmp, index)
    }

    fn resolve(index: &LibraryIndex, artist: &str, title: &str, album: &str) -> MatchResult {
        Resolver::new(index, ResolveOptions::default()).resolve(&DesiredTrack::new(artist, title, album))
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    fn rel(root: &Path, rel: &str) -> PathBuf {
        root.join(rel)
    }

    #[test]
    fn test_every_indexed_file_is_found_by_its_own_names() {
        let files = [
            "Daft Punk/Discovery/One More Time.mp3",
            "Björk/Post/Army of Me.flac",
            "Simon & Garfunkel/Bookends/America.m4a",
        ];
        let (tmp, index) = library(&files);
        for f in files {
            let parts: Vec<&str> = f.split('/').collect();
            let stem = parts[2].rsplit_once('.').unwrap().0;
            let result = resolve(&index, parts[0], stem, parts[1]);
            assert_eq!(result.strategy, Some(Strategy::Exact), "{f}");
            assert_eq!(result.matched_paths, vec![rel(tmp.path(), f)]);
        }
    }

    #[test]
    fn test_numbered_file_found_by_plain_title() {
        let (_tmp, index) = library(&["Artist/Album/02. Song Title.flac"]);
        let result = resolve(&index, "Artist", "Song Title", "Album");
        assert_eq!(result.status, MatchStatus::Found);
        assert_eq!(result.strategy, Some(Strategy::Exact));
        assert_eq!(names(&result.matched_paths), vec!["02. Song Title.flac"]);
    }

    #[test]
    fn test_flexible_album_matches_release_suffix() {
        let (_tmp, index) = library(&["Artist/Greatest Hits/Song.mp3"]);
        let result = resolve(&index, "Artist", "Song", "Greatest Hits - EP");
        assert_eq!(result.strategy, Some(Strategy::FlexibleAlbum));

        // The folder can carry the suffix instead
        let (_tmp, index) = library(&["Artist/Greatest Hits - EP/Song.mp3"]);
        let result = resolve(&index, "Artist", "Song", "Greatest Hits");
        assert!(result.is_found());
    }

    #[test]
    fn test_extracted_title_drops_artist_prefix() {
        let (_tmp, index) = library(&["Artist/Album/Song.mp3"]);
        let result = resolve(&index, "Artist", "Artist - Song", "Album");
        assert_eq!(result.strategy, Some(Strategy::ExtractedTitle));
    }

    #[test]
    fn test_token_subset_within_album() {
        let (_tmp, index) = library(&["Artist/Album/Song Title Remastered.mp3"]);
        let result = resolve(&index, "Artist", "Song Title", "Album");
        assert_eq!(result.strategy, Some(Strategy::TokenSubset));
    }

    #[test]
    fn test_parenthetical_title_falls_back_to_plain_file() {
        let (_tmp, index) = library(&["Artist/Album/Song.flac"]);
        let result = resolve(&index, "Artist", "Song (Remix)", "Album");
        assert_eq!(result.strategy, Some(Strategy::ParentheticalStripped));
        assert_eq!(names(&result.matched_paths), vec!["Song.flac"]);
    }

    #[test]
    fn test_parenthetical_file_found_by_plain_title() {
        let (_tmp, index) = library(&["Artist/Album/Song (Remix).flac"]);
        let result = resolve(&index, "Artist", "Song", "Album");
        assert_eq!(result.strategy, Some(Strategy::Exact));
    }

    #[test]
    fn test_artist_only_ignores_album() {
        let (_tmp, index) = library(&["Artist/Some Other Album/Song.mp3"]);
        let result = resolve(&index, "Artist", "Song", "Album");
        assert_eq!(result.strategy, Some(Strategy::ArtistOnly));

        // Single-word title subsets are too loose across a whole artist
        let (_tmp, index) = library(&["Artist/Other/Song Remastered.mp3"]);
        let result = resolve(&index, "Artist", "Song", "Album");
        assert_eq!(result.status, MatchStatus::Missing);
    }

    #[test]
    fn test_compilation_folder() {
        let (_tmp, index) = library(&["Various Artists/Now 99/Song.mp3"]);
        let result = resolve(&index, "Artist", "Song", "Now 99");
        assert_eq!(result.strategy, Some(Strategy::Compilation));

        let (_tmp, index) = library(&["OST/Film/Main Theme Extended.mp3"]);
        let result = resolve(&index, "Composer", "Main Theme", "Unrelated");
        assert_eq!(result.strategy, Some(Strategy::Compilation));
    }

    #[test]
    fn test_feat_and_ampersand_variants_match() {
        let (_tmp, index) = library(&["Simon and Garfunkel/Bookends/Song.mp3"]);
        let result = resolve(&index, "Simon & Garfunkel", "Song (feat. Someone)", "Bookends");
        assert_eq!(result.strategy, Some(Strategy::Exact));
    }

    #[test]
    fn test_missing_track_lists_ranked_candidates() {
        let (_tmp, index) = library(&[
            "Artist/Album/01 Intro.mp3",
            "Artist/Album/Blue Monday Morning Song.mp3",
            "Artist/Album/Monday Night Lights Out.mp3",
        ]);
        // Two of three words shared is enough inside the album
        let result = resolve(&index, "Artist", "Monday Blue Sky", "Album");
        assert_eq!(result.strategy, Some(Strategy::TokenSubset));

        let result = resolve(&index, "Artist", "Grey Monday Afternoon", "Album");
        assert_eq!(result.status, MatchStatus::Missing);
        assert_eq!(
            names(&result.candidate_paths),
            vec!["Blue Monday Morning Song.mp3", "Monday Night Lights Out.mp3"]
        );
    }

    #[test]
    fn test_candidates_can_be_disabled() {
        let (_tmp, index) = library(&["Artist/Album/Other Song.mp3"]);
        let options = ResolveOptions {
            include_candidates: false,
            ..ResolveOptions::default()
        };
        let result = Resolver::new(&index, options).resolve(&DesiredTrack::new("Artist", "Nope", "Album"));
        assert_eq!(result.status, MatchStatus::Missing);
        assert!(result.candidate_paths.is_empty());
    }

    #[test]
    fn test_empty_library_reports_all_missing() {
        let (_tmp, index) = library(&["Artist/Album/notes.txt"]);
        let tracks = vec![
            DesiredTrack::new("Artist", "Song", "Album"),
            DesiredTrack::new("", "", ""),
        ];
        let results = Resolver::new(&index, ResolveOptions::default())
            .resolve_all(&tracks, &ProgressBar::hidden());
        assert_eq!(results.len(), 2);
        for r in results {
            assert_eq!(r.status, MatchStatus::Missing);
            assert!(r.matched_paths.is_empty());
            assert!(r.candidate_paths.is_empty());
        }
    }

    #[test]
    fn test_empty_track_list() {
        let (_tmp, index) = library(&["Artist/Album/Song.mp3"]);
        let results = Resolver::new(&index, ResolveOptions::default())
            .resolve_all(&[], &ProgressBar::hidden());
        assert!(results.is_empty());
    }

    #[test]
    fn test_resolve_all_keeps_input_order() {
        let (_tmp, index) = library(&["A/X/One.mp3", "B/Y/Two.mp3"]);
        let tracks = vec![
            DesiredTrack::new("B", "Two", "Y"),
            DesiredTrack::new("C", "Nothing", "Z"),
            DesiredTrack::new("A", "One", "X"),
        ];
        let results = Resolver::new(&index, ResolveOptions::default())
            .resolve_all(&tracks, &ProgressBar::hidden());
        assert_eq!(names(&results[0].matched_paths), vec!["Two.mp3"]);
        assert!(!results[1].is_found());
        assert_eq!(names(&results[2].matched_paths), vec!["One.mp3"]);
    }

    #[test]
    fn test_duplicate_hits_are_listed_once() {
        // Both files register (artist, album, song)
        let (_tmp, index) = library(&["Artist/Album/01. Song.mp3", "Artist/Album/Song.mp3"]);
        let result = resolve(&index, "Artist", "Song", "Album");
        assert_eq!(names(&result.matched_paths), vec!["01. Song.mp3", "Song.mp3"]);
    }

    #[test]
    fn test_parenthetical_variants_reachable_by_full_and_plain_title() {
        let (_tmp, index) = library(&[
            "Artist/Album/Song (Live).mp3",
            "Artist/Album/Song (Remix).mp3",
        ]);
        for title in ["Song (Live)", "Song (Remix)", "Song"] {
            let result = resolve(&index, "Artist", title, "Album");
            assert!(result.is_found(), "{title}");
        }
        let live = resolve(&index, "Artist", "Song (Live)", "Album");
        assert_eq!(names(&live.matched_paths), vec!["Song (Live).mp3"]);
    }

    #[test]
    fn test_parenthetical_aliases_only_add_matches() {
        let files = [
            "Artist/Album/Song (Live).mp3",
            "Artist/Album/02. Artist - Intro (Demo).flac",
            "Artist/Album - EP/Track Name (2009 Remaster).mp3",
            "Artist/Other/Hello World (Radio Edit).mp3",
            "Various Artists/Now 99/Hit (Extended Mix).mp3",
        ];
        let (tmp, with_aliases) = library(&files);
        let without_options = IndexOptions {
            parenthetical_aliases: false,
            ..IndexOptions::default()
        };
        let without_aliases = LibraryIndex::build(tmp.path(), &without_options).unwrap();
        assert!(without_aliases.stats().keys < with_aliases.stats().keys);

        let mut tracks = Vec::new();
        for artist in ["Artist", "Someone Else"] {
            for album in ["Album", "Album - EP", "Other", "Now 99", "Unknown", ""] {
                for title in [
                    "Song",
                    "Song (Live)",
                    "Intro",
                    "Artist - Intro (Demo)",
                    "02. Intro",
                    "Track Name",
                    "Track Name (2009 Remaster)",
                    "Hello World",
                    "Hello World (Radio Edit)",
                    "Hit",
                    "Hit (Extended Mix)",
                    "Nothing Here",
                ] {
                    tracks.push(DesiredTrack::new(artist, title, album));
                }
            }
        }

        let with = Resolver::new(&with_aliases, ResolveOptions::default());
        let without = Resolver::new(&without_aliases, ResolveOptions::default());
        for track in &tracks {
            if without.resolve(track).is_found() {
                assert!(with.resolve(track).is_found(), "{track:?}");
            }
        }

        // Only the alias makes a one-word title reachable outside its album
        let plain = DesiredTrack::new("Artist", "Song", "Unknown");
        assert!(!without.resolve(&plain).is_found());
        assert_eq!(with.resolve(&plain).strategy, Some(Strategy::ArtistOnly));
    }

    #[test]
    fn test_remix_variant_and_plain_file_both_match_exactly() {
        // "Song (Remix)" is registered under "song" too, so the cascade stops at step 1
        let (_tmp, index) = library(&["Artist/Album/Song.mp3", "Artist/Album/Song (Remix).mp3"]);
        let result = resolve(&index, "Artist", "Song", "Album");
        assert_eq!(result.strategy, Some(Strategy::Exact));
        assert_eq!(names(&result.matched_paths), vec!["Song (Remix).mp3", "Song.mp3"]);

        let remix = resolve(&index, "Artist", "Song (Remix)", "Album");
        assert_eq!(remix.strategy, Some(Strategy::Exact));
        assert_eq!(names(&remix.matched_paths), vec!["Song (Remix).mp3"]);
    }

    #[test]
    fn test_artist_only_token_subset_across_albums() {
        let (_tmp, index) = library(&["Artist/Other/Hello World Live.mp3"]);
        let result = resolve(&index, "Artist", "Hello World", "Album");
        assert_eq!(result.strategy, Some(Strategy::ArtistOnly));
        assert_eq!(names(&result.matched_paths), vec!["Hello World Live.mp3"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_track_resolves() {
        let tmp = TempDir::new().unwrap();
        let real = tmp.path().join("store/Song.mp3");
        fs::create_dir_all(real.parent().unwrap()).unwrap();
        fs::write(&real, b"").unwrap();
        let lib = tmp.path().join("lib");
        fs::create_dir_all(lib.join("Artist/Album")).unwrap();
        std::os::unix::fs::symlink(&real, lib.join("Artist/Album/Song.mp3")).unwrap();

        let index = LibraryIndex::build(&lib, &IndexOptions::default()).unwrap();
        let result = resolve(&index, "Artist", "Song", "Album");
        assert_eq!(result.strategy, Some(Strategy::Exact));
        assert_eq!(result.matched_paths, vec![lib.join("Artist/Album/Song.mp3")]);
    }

    #[test]
    fn test_track_query_variants() {
        let q = TrackQuery::new(&DesiredTrack::new("Artist", "Song (Live)", "Hits - EP"));
        assert_eq!(q.album, "hits ep");
        assert_eq!(q.flexible_album, "hits");
        assert_eq!(q.album_variants().collect::<Vec<_>>(), vec!["hits ep", "hits"]);
        assert_eq!(q.stripped_title.as_deref(), Some("Song"));

        let q = TrackQuery::new(&DesiredTrack::new("Artist", "Song", ""));
        assert_eq!(q.album_variants().count(), 0);
        assert!(q.stripped_title.is_none());
    }
}
