//! Multi-key library index.
//!
//! Walks `root/.../Artist/Album/Track.ext` and registers every audio file under
//! its normalized `(artist, album, track)` triple plus the alias variants the
//! resolver looks up (extracted title, flexible album, parenthetical-stripped).
//!
//! Built once per run, immutable afterwards, safe to share across rayon workers.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, trace, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::MatchError;
use crate::models::{
    ArtistBuckets, EntryId, FileId, IndexEntry, IndexStats, KeyLookup, LibraryFile,
    NormalizedKey, StringInterner,
};
use crate::normalize::{extract_track_name, normalize, normalize_album, strip_parentheticals};

/// Audio extensions indexed when nothing else is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "flac", "wav", "aiff", "aif", "ogg", "opus", "alac",
];

/// Walkdir depth of `root/Artist/Album/Track.ext`
const MIN_TRACK_DEPTH: usize = 3;

#[derive(Clone, Debug)]
pub struct IndexOptions {
    /// Extensions without the dot; case and a leading "." are ignored.
    pub extensions: Vec<String>,
    /// Descend into symlinked directories. Symlinked files are indexed either way.
    pub follow_links: bool,
    /// Also register "Song (Live)" under "song".
    pub parenthetical_aliases: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            follow_links: false,
            parenthetical_aliases: true,
        }
    }
}

impl IndexOptions {
    pub fn extension_set(&self) -> FxHashSet<String> {
        self.extensions
            .iter()
            .map(|e| normalize_extension(e))
            .filter(|e| !e.is_empty())
            .collect()
    }
}

/// " .FLAC" -> "flac"
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

pub struct LibraryIndex {
    root: PathBuf,
    files: Vec<LibraryFile>,
    entries: Vec<IndexEntry>,
    lookup: KeyLookup,
    by_artist: ArtistBuckets,
    stats: IndexStats,
}

impl LibraryIndex {
    /// Walk `root` and build the index.
    ///
    /// Fails only on configuration problems (missing root, root is a file,
    /// no extensions). Unreadable or misplaced entries are counted in
    /// [`IndexStats`] and skipped.
    pub fn build(root: &Path, options: &IndexOptions) -> Result<Self, MatchError> {
        if !root.exists() {
            return Err(MatchError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(MatchError::RootNotDirectory(root.to_path_buf()));
        }
        let extensions = options.extension_set();
        if extensions.is_empty() {
            return Err(MatchError::NoExtensions);
        }

        let start = Instant::now();
        let mut builder = IndexBuilder::new(root, options.parenthetical_aliases);

        let walker = WalkDir::new(root)
            .follow_links(options.follow_links)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    builder.stats.walk_errors += 1;
                    warn!(error = %e, "Skipping unreadable library entry");
                    continue;
                }
            };
            // Follows a symlinked file even when directory links are not followed
            if !entry.path().is_file() {
                continue;
            }
            builder.stats.files_seen += 1;

            if !has_audio_extension(entry.path(), &extensions) {
                builder.stats.skipped_extension += 1;
                trace!(path = %entry.path().display(), "Skipping non-audio file");
                continue;
            }
            if entry.depth() < MIN_TRACK_DEPTH {
                builder.stats.skipped_shallow += 1;
                trace!(path = %entry.path().display(), "Skipping file outside Artist/Album");
                continue;
            }
            match path_components(&entry) {
                Some(file) => builder.add_file(file),
                None => {
                    builder.stats.skipped_non_utf8 += 1;
                    debug!(path = %entry.path().display(), "Skipping non-UTF-8 path");
                }
            }
        }

        let index = builder.finish();
        info!(
            root = %root.display(),
            files = index.stats.files_indexed,
            keys = index.stats.keys,
            artists = index.stats.artists,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Library index built"
        );
        Ok(index)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[LibraryFile] {
        &self.files
    }

    pub fn file(&self, id: FileId) -> &LibraryFile {
        &self.files[id]
    }

    pub fn path(&self, id: FileId) -> &Path {
        &self.files[id].path
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// All keys in first-insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Files registered under `key`, in discovery order. Empty when absent.
    pub fn get(&self, key: &NormalizedKey) -> &[FileId] {
        self.lookup
            .get(key)
            .map(|&id| self.entries[id].files.as_slice())
            .unwrap_or(&[])
    }

    /// Convenience wrapper over [`get`](Self::get) for already-normalized parts.
    pub fn lookup(&self, artist: &str, album: &str, track: &str) -> &[FileId] {
        self.get(&NormalizedKey::new(artist, album, track))
    }

    /// Entries whose artist equals `artist`, in key-insertion order.
    pub fn entries_for_artist<'a>(&'a self, artist: &str) -> impl Iterator<Item = &'a IndexEntry> + 'a {
        self.by_artist
            .get(artist)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&id| &self.entries[id])
    }

    /// Unique files under any key for `(artist, album)`, in discovery order.
    pub fn files_in_group(&self, artist: &str, album: &str) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self
            .entries_for_artist(artist)
            .filter(|e| &*e.key.album == album)
            .flat_map(|e| e.files.iter().copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

// ============================================================================
// Building
// ============================================================================

struct IndexBuilder {
    root: PathBuf,
    interner: StringInterner,
    files: Vec<LibraryFile>,
    entries: Vec<IndexEntry>,
    lookup: KeyLookup,
    by_artist: ArtistBuckets,
    stats: IndexStats,
    parenthetical_aliases: bool,
}

impl IndexBuilder {
    fn new(root: &Path, parenthetical_aliases: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            interner: StringInterner::new(),
            files: Vec::new(),
            entries: Vec::new(),
            lookup: FxHashMap::default(),
            by_artist: FxHashMap::default(),
            stats: IndexStats::default(),
            parenthetical_aliases,
        }
    }

    fn add_file(&mut self, file: LibraryFile) {
        let id = self.files.len();

        let artist = normalize(&file.artist);
        let album = normalize(&file.album);
        let track = normalize(&file.stem);
        let flexible = normalize_album(&file.album);
        let extracted = extract_track_name(&file.stem, &file.artist);
        let flex_differs = flexible != album;

        self.register(id, &artist, &album, &track);

        if extracted != track {
            self.register(id, &artist, &album, &extracted);
            if flex_differs {
                self.register(id, &artist, &flexible, &extracted);
            }
        }

        if flex_differs {
            self.register(id, &artist, &flexible, &track);
            if extracted != track {
                self.register(id, &artist, &flexible, &extracted);
            }
        }

        if self.parenthetical_aliases {
            self.register_stripped(id, &file, &artist, &album, &flexible, &track);
        }

        self.files.push(file);
        self.stats.files_indexed += 1;
    }

    /// "Song (Live)" on disk is also reachable as "Song".
    fn register_stripped(
        &mut self,
        id: FileId,
        file: &LibraryFile,
        artist: &str,
        album: &str,
        flexible: &str,
        track: &str,
    ) {
        let flex_differs = flexible != album;
        let stripped = strip_parentheticals(&file.stem);
        if !stripped.is_empty() && stripped != file.stem {
            let stripped_norm = normalize(&stripped);
            if stripped_norm != track {
                self.register(id, artist, album, &stripped_norm);
                if flex_differs {
                    self.register(id, artist, flexible, &stripped_norm);
                }
                let stripped_extracted = extract_track_name(&stripped, &file.artist);
                if stripped_extracted != stripped_norm {
                    self.register(id, artist, album, &stripped_extracted);
                    if flex_differs {
                        self.register(id, artist, flexible, &stripped_extracted);
                    }
                }
            }
        }
    }

    fn register(&mut self, id: FileId, artist: &str, album: &str, track: &str) {
        let key = NormalizedKey {
            artist: self.interner.intern(artist),
            album: self.interner.intern(album),
            track: self.interner.intern(track),
        };

        if let Some(&entry_id) = self.lookup.get(&key) {
            let files = &mut self.entries[entry_id].files;
            // A file's registrations are consecutive, so checking the tail dedupes
            if files.last() != Some(&id) {
                files.push(id);
            }
            return;
        }

        let entry_id: EntryId = self.entries.len();
        self.by_artist
            .entry(key.artist.clone())
            .or_default()
            .push(entry_id);
        self.lookup.insert(key.clone(), entry_id);
        self.entries.push(IndexEntry {
            key,
            files: vec![id],
        });
    }

    fn finish(mut self) -> LibraryIndex {
        self.stats.keys = self.entries.len();
        self.stats.artists = self.by_artist.len();
        LibraryIndex {
            root: self.root,
            files: self.files,
            entries: self.entries,
            lookup: self.lookup,
            by_artist: self.by_artist,
            stats: self.stats,
        }
    }
}

fn has_audio_extension(path: &Path, extensions: &FxHashSet<String>) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| extensions.contains(&ext.to_ascii_lowercase()))
        .unwrap_or(false)
}

/// Split a track path into (artist, album, stem); `None` if any part is not UTF-8.
fn path_components(entry: &DirEntry) -> Option<LibraryFile> {
    let path = entry.path();
    let stem = path.file_stem()?.to_str()?;
    let album_dir = path.parent()?;
    let album = album_dir.file_name()?.to_str()?;
    let artist = album_dir.parent()?.file_name()?.to_str()?;

    Some(LibraryFile {
        path: path.to_path_buf(),
        artist: artist.to_string(),
        album: album.to_string(),
        stem: stem.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"").unwrap();
        path
    }

    fn build(root: &Path) -> LibraryIndex {
        LibraryIndex::build(root, &IndexOptions::default()).unwrap()
    }

    #[test]
    fn test_rejects_missing_root() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let err = LibraryIndex::build(&missing, &IndexOptions::default()).err().unwrap();
        assert!(matches!(err, MatchError::RootNotFound(_)));
    }

    #[test]
    fn test_rejects_file_root() {
        let tmp = TempDir::new().unwrap();
        let file = touch(tmp.path(), "song.mp3");
        let err = LibraryIndex::build(&file, &IndexOptions::default()).err().unwrap();
        assert!(matches!(err, MatchError::RootNotDirectory(_)));
    }

    #[test]
    fn test_rejects_empty_extension_set() {
        let tmp = TempDir::new().unwrap();
        let options = IndexOptions {
            extensions: vec![" . ".to_string(), String::new()],
            ..IndexOptions::default()
        };
        let err = LibraryIndex::build(tmp.path(), &options).err().unwrap();
        assert!(matches!(err, MatchError::NoExtensions));
    }

    #[test]
    fn test_exact_key_points_at_file() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "Björk/Homogenic/Jóga.flac");
        let index = build(tmp.path());

        assert_eq!(index.len(), 1);
        let ids = index.lookup("bjork", "homogenic", "joga");
        assert_eq!(ids, &[0]);
        assert_eq!(index.path(ids[0]), path.as_path());
    }

    #[test]
    fn test_registers_all_alias_keys() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Artist/Album - EP/02. Song Title (Live).flac");
        let index = build(tmp.path());

        let expected = [
            ("album ep", "02 song title live"),
            ("album ep", "song title live"),
            ("album", "song title live"),
            ("album", "02 song title live"),
            ("album ep", "02 song title"),
            ("album", "02 song title"),
            ("album ep", "song title"),
            ("album", "song title"),
        ];
        for (album, track) in expected {
            assert_eq!(index.lookup("artist", album, track), &[0], "{album} / {track}");
        }
        assert_eq!(index.stats().keys, expected.len());
        assert_eq!(index.stats().artists, 1);

        // First-insertion order is preserved
        let first: Vec<&str> = index.entries().iter().take(2).map(|e| &*e.key.track).collect();
        assert_eq!(first, vec!["02 song title live", "song title live"]);
    }

    #[test]
    fn test_skips_shallow_and_non_audio() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "loose.mp3");
        touch(tmp.path(), "Artist/single.mp3");
        touch(tmp.path(), "Artist/Album/cover.jpg");
        touch(tmp.path(), "Artist/Album/Track.MP3");
        let index = build(tmp.path());

        let stats = index.stats();
        assert_eq!(stats.files_seen, 4);
        assert_eq!(stats.files_indexed, 1);
        assert_eq!(stats.skipped_shallow, 2);
        assert_eq!(stats.skipped_extension, 1);
        assert_eq!(index.lookup("artist", "album", "track"), &[0]);
    }

    #[test]
    fn test_deeper_trees_use_nearest_two_directories() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Rock/Artist/Album/Song.ogg");
        let index = build(tmp.path());

        let file = index.file(0);
        assert_eq!(file.artist, "Artist");
        assert_eq!(file.album, "Album");
        assert_eq!(file.stem, "Song");
    }

    #[test]
    fn test_shared_key_lists_files_once_in_discovery_order() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Artist/Album/Song.mp3");
        touch(tmp.path(), "Artist/Album/01. Song.mp3");
        let index = build(tmp.path());

        // "01. Song" sorts first and also registers the extracted "song"
        assert_eq!(index.file(0).stem, "01. Song");
        assert_eq!(index.lookup("artist", "album", "song"), &[0, 1]);
        assert_eq!(index.files_in_group("artist", "album"), vec![0, 1]);
        assert!(index.files_in_group("artist", "other").is_empty());
    }

    #[test]
    fn test_entries_for_artist_is_scoped() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "A/X/One.mp3");
        touch(tmp.path(), "B/Y/Two.mp3");
        touch(tmp.path(), "A/Z/Three.mp3");
        let index = build(tmp.path());

        let tracks: Vec<&str> = index.entries_for_artist("a").map(|e| &*e.key.track).collect();
        assert_eq!(tracks, vec!["one", "three"]);
        assert_eq!(index.entries_for_artist("nobody").count(), 0);
    }

    #[test]
    fn test_custom_extensions_are_normalized() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "A/B/keep.ogg");
        touch(tmp.path(), "A/B/drop.mp3");
        let options = IndexOptions {
            extensions: vec![".OGG".to_string()],
            ..IndexOptions::default()
        };
        let index = LibraryIndex::build(tmp.path(), &options).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.file(0).stem, "keep");
        assert_eq!(index.stats().skipped_extension, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_track_is_indexed() {
        let tmp = TempDir::new().unwrap();
        let real = touch(tmp.path(), "elsewhere/Song.mp3");
        let lib = tmp.path().join("lib");
        fs::create_dir_all(lib.join("Artist/Album")).unwrap();
        std::os::unix::fs::symlink(&real, lib.join("Artist/Album/Song.mp3")).unwrap();

        let index = build(&lib);
        assert_eq!(index.stats().files_seen, 1);
        assert_eq!(index.stats().files_indexed, 1);
        assert_eq!(index.lookup("artist", "album", "song"), &[0]);
        assert_eq!(index.path(0), lib.join("Artist/Album/Song.mp3").as_path());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_needs_follow_links() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "elsewhere/Album/Song.mp3");
        let lib = tmp.path().join("lib");
        fs::create_dir_all(&lib).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("elsewhere"), lib.join("Artist")).unwrap();

        assert_eq!(build(&lib).len(), 0);
        let options = IndexOptions {
            follow_links: true,
            ..IndexOptions::default()
        };
        let index = LibraryIndex::build(&lib, &options).unwrap();
        assert_eq!(index.lookup("artist", "album", "song"), &[0]);
    }

    #[test]
    fn test_parenthetical_aliases_can_be_turned_off() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Artist/Album/Song (Live).mp3");
        let options = IndexOptions {
            parenthetical_aliases: false,
            ..IndexOptions::default()
        };
        let index = LibraryIndex::build(tmp.path(), &options).unwrap();
        assert_eq!(index.lookup("artist", "album", "song live"), &[0]);
        assert!(index.lookup("artist", "album", "song").is_empty());
        assert_eq!(build(tmp.path()).lookup("artist", "album", "song"), &[0]);
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(" .FLAC "), "flac");
        assert_eq!(normalize_extension("mp3"), "mp3");
    }
}
