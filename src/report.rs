//! Match report: one entry per desired track plus found/missing counts.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{DesiredTrack, MatchResult, MatchStatus, Strategy};

#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub meta: Map<String, Value>,
    pub summary: ReportSummary,
    pub results: Vec<ReportEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReportSummary {
    pub library_root: String,
    pub total_tracks: usize,
    pub found: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub time: String,
    pub artist: String,
    pub album: String,
    pub title: String,
    pub match_status: MatchStatus,
    pub strategy: Option<Strategy>,
    pub matched_paths: Vec<String>,
    /// Present only for misses when candidate search was on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_paths: Option<Vec<String>>,
}

impl MatchReport {
    /// Pair each track with its result. `tracks` and `results` are parallel.
    pub fn build(
        meta: Map<String, Value>,
        library_root: &Path,
        tracks: &[DesiredTrack],
        results: &[MatchResult],
        include_candidates: bool,
    ) -> Self {
        debug_assert_eq!(tracks.len(), results.len());

        let entries: Vec<ReportEntry> = tracks
            .iter()
            .zip(results)
            .map(|(track, result)| ReportEntry {
                time: track.time.clone(),
                artist: track.artist.clone(),
                album: track.album.clone(),
                title: track.title.clone(),
                match_status: result.status,
                strategy: result.strategy,
                matched_paths: path_strings(&result.matched_paths),
                candidate_paths: (include_candidates && !result.is_found())
                    .then(|| path_strings(&result.candidate_paths)),
            })
            .collect();

        let found = entries
            .iter()
            .filter(|e| e.match_status == MatchStatus::Found)
            .count();

        Self {
            meta,
            summary: ReportSummary {
                library_root: library_root.display().to_string(),
                total_tracks: entries.len(),
                found,
                missing: entries.len() - found,
            },
            results: entries,
        }
    }

    pub fn summary(&self) -> &ReportSummary {
        &self.summary
    }

    /// How many found tracks each strategy accounts for, in cascade order.
    pub fn strategy_counts(&self) -> Vec<(Strategy, usize)> {
        Strategy::ALL
            .iter()
            .map(|&s| {
                let n = self.results.iter().filter(|e| e.strategy == Some(s)).count();
                (s, n)
            })
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize match report")
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()? + "\n")
            .with_context(|| format!("Failed to write report {}", path.display()))
    }
}

pub(crate) fn path_strings(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}
