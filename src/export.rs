//! Copy resolved playlist tracks into a numbered folder and write `manifest.json`.
//!
//! Destination names are `NN - Artist - Title.ext` in playlist order. Tracks the
//! cascade cannot find fall back to the best-named file of the same
//! artist/album; those are marked `candidate` in the manifest.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

use crate::models::{DesiredTrack, MatchResult};
use crate::playlist::Playlist;
use crate::progress::log_progress;
use crate::resolve::{Resolver, TrackQuery};
use crate::scoring::pick_best;

/// Longest name chunk kept by `safe_filename`, in characters
pub const MAX_NAME_CHARS: usize = 180;

pub const MANIFEST_NAME: &str = "manifest.json";

const NOTE_EXISTS: &str = "exists (not overwritten)";

#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Put files in "YYYY-MM-DD - Title" under the target instead of the target itself
    pub make_subfolder: bool,
    pub overwrite: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            make_subfolder: true,
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Found by the resolution cascade
    Exact,
    /// Best-named file from the same artist/album
    Candidate,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportManifest {
    pub meta: Map<String, Value>,
    pub library_root: String,
    pub destination_folder: String,
    pub summary: ExportSummary,
    pub results: Vec<ExportEntry>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ExportSummary {
    pub total_tracks: usize,
    pub copied: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportEntry {
    pub order: usize,
    pub time: String,
    pub artist: String,
    pub album: String,
    pub title: String,
    pub match_type: Option<MatchType>,
    pub source_path: Option<String>,
    pub copied_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Make a filesystem-friendly name chunk.
///
/// e.g., "AC/DC" → "AC-DC", "What?" → "What", "" → "unknown"
pub fn safe_filename(s: &str) -> String {
    let decomposed: String = s.nfkd().collect::<String>().replace('/', "-");
    let collapsed = decomposed.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned: String = collapsed
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '\\' | '|' | '?' | '*') && !c.is_ascii_control())
        .collect();
    let truncated: String = cleaned.chars().take(MAX_NAME_CHARS).collect();
    let trimmed = truncated.trim();
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Zero-pad width for track numbers: at least two digits.
fn order_width(total: usize) -> usize {
    total.to_string().len().max(2)
}

fn destination_name(order: usize, width: usize, track: &DesiredTrack, source: &Path) -> String {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!(
        "{:0width$} - {} - {}{}",
        order,
        safe_filename(&track.artist),
        safe_filename(&track.title),
        ext,
        width = width
    )
}

/// Pick the file to copy: best of the cascade's hits, else the best-named
/// file of the same artist/album (flexible album when the exact one is empty).
pub fn choose_source(
    resolver: &Resolver<'_>,
    track: &DesiredTrack,
    result: &MatchResult,
) -> Option<(PathBuf, MatchType)> {
    if result.is_found() {
        return pick_best(&track.title, &result.matched_paths).map(|p| (p, MatchType::Exact));
    }

    let index = resolver.index();
    let q = TrackQuery::new(track);
    let mut group = index.files_in_group(&q.artist, &q.album);
    if group.is_empty() && q.flexible_album != q.album {
        group = index.files_in_group(&q.artist, &q.flexible_album);
    }
    let paths: Vec<&Path> = group.iter().map(|&id| index.path(id)).collect();
    pick_best(&track.title, &paths).map(|p| (p, MatchType::Candidate))
}

/// Resolve and copy every playlist track into `target`, then write the manifest there.
pub fn export_playlist(
    resolver: &Resolver<'_>,
    playlist: &Playlist,
    target: &Path,
    options: &ExportOptions,
    pb: &ProgressBar,
) -> Result<ExportManifest> {
    let dest_folder = if options.make_subfolder {
        target.join(safe_filename(&playlist.folder_title()))
    } else {
        target.to_path_buf()
    };
    fs::create_dir_all(&dest_folder)
        .with_context(|| format!("Failed to create export folder {}", dest_folder.display()))?;

    let results = resolver.resolve_all(&playlist.tracks, &ProgressBar::hidden());
    let width = order_width(playlist.tracks.len());
    let total = playlist.tracks.len() as u64;
    let interval = (total / 20).max(1);
    let mut summary = ExportSummary {
        total_tracks: playlist.tracks.len(),
        ..ExportSummary::default()
    };
    let mut entries = Vec::with_capacity(playlist.tracks.len());

    for (i, (track, result)) in playlist.tracks.iter().zip(&results).enumerate() {
        let order = i + 1;
        let mut entry = ExportEntry {
            order,
            time: track.time.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            title: track.title.clone(),
            match_type: None,
            source_path: None,
            copied_path: None,
            note: None,
        };
        pb.inc(1);
        log_progress("export", order as u64, total, interval);

        let Some((source, match_type)) = choose_source(resolver, track, result) else {
            summary.missing += 1;
            debug!(order, artist = %track.artist, title = %track.title, "No file to export");
            entries.push(entry);
            continue;
        };
        entry.match_type = Some(match_type);
        entry.source_path = Some(source.display().to_string());

        let dest_path = dest_folder.join(destination_name(order, width, track, &source));
        entry.copied_path = Some(dest_path.display().to_string());

        if dest_path.exists() && !options.overwrite {
            entry.note = Some(NOTE_EXISTS.to_string());
            entries.push(entry);
            continue;
        }

        fs::copy(&source, &dest_path).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                source.display(),
                dest_path.display()
            )
        })?;
        summary.copied += 1;
        entries.push(entry);
    }

    let manifest = ExportManifest {
        meta: playlist.meta.clone(),
        library_root: resolver.index().root().display().to_string(),
        destination_folder: dest_folder.display().to_string(),
        summary,
        results: entries,
    };

    let manifest_path = dest_folder.join(MANIFEST_NAME);
    let json = serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;
    fs::write(&manifest_path, json + "\n")
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    info!(
        folder = %dest_folder.display(),
        copied = manifest.summary.copied,
        missing = manifest.summary.missing,
        "Playlist exported"
    );
    Ok(manifest)
}
