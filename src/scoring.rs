//! Token-overlap scoring.
//!
//! Two consumers:
//! - the resolver's token strategies (subset / two-thirds overlap rules)
//! - candidate ranking for misses and best-path selection for export

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::normalize::{normalize, tokens};

/// Shortest word set allowed to match by containment or overlap
pub const MIN_TOKENS: usize = 2;

/// Number of shared words between two token sets.
pub fn overlap(a: &FxHashSet<&str>, b: &FxHashSet<&str>) -> usize {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().filter(|t| large.contains(*t)).count()
}

/// Two-thirds overlap: both sides have at least two words and they share
/// at least `min(|a|, |b|) * 2 / 3` of them (integer division).
pub fn mostly_overlaps(a: &FxHashSet<&str>, b: &FxHashSet<&str>) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let min_len = a.len().min(b.len());
    min_len >= MIN_TOKENS && overlap(a, b) >= min_len * 2 / 3
}

/// Album-scoped rule: every title word is in the track, the track is a
/// multi-word subset of the title, or the two mostly overlap.
pub fn album_tokens_match(title: &FxHashSet<&str>, track: &FxHashSet<&str>) -> bool {
    title.is_subset(track)
        || (track.is_subset(title) && track.len() >= MIN_TOKENS)
        || mostly_overlaps(title, track)
}

/// Artist-wide rule: like the album rule, but a title subset needs two words.
pub fn artist_tokens_match(title: &FxHashSet<&str>, track: &FxHashSet<&str>) -> bool {
    (!title.is_empty() && title.is_subset(track) && title.len() >= MIN_TOKENS)
        || (track.is_subset(title) && track.len() >= MIN_TOKENS)
        || mostly_overlaps(title, track)
}

/// Compilation-folder rule: multi-word containment in either direction, no overlap rule.
pub fn compilation_tokens_match(title: &FxHashSet<&str>, track: &FxHashSet<&str>) -> bool {
    (!title.is_empty() && title.is_subset(track) && title.len() >= MIN_TOKENS)
        || (track.is_subset(title) && track.len() >= MIN_TOKENS)
}

/// Shared words between a desired title and a file's stem.
pub fn stem_score(title_tokens: &FxHashSet<&str>, path: &Path) -> usize {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let stem_norm = normalize(&stem);
    overlap(title_tokens, &tokens(&stem_norm))
}

/// Rank near-miss files by word overlap with `title`.
///
/// Zero-score files are dropped; ties keep the input order (stable sort).
pub fn score_candidates<P: AsRef<Path>>(title: &str, candidates: &[P], limit: usize) -> Vec<PathBuf> {
    let title_norm = normalize(title);
    let want = tokens(&title_norm);

    let mut scored: Vec<(usize, &Path)> = candidates
        .iter()
        .map(|p| (stem_score(&want, p.as_ref()), p.as_ref()))
        .filter(|(score, _)| *score > 0)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, p)| p.to_path_buf())
        .collect()
}

/// Pick one path for `title`: the highest stem overlap, first path on ties.
/// With no title words there is nothing to compare, so the first path wins.
pub fn pick_best<P: AsRef<Path>>(title: &str, paths: &[P]) -> Option<PathBuf> {
    let title_norm = normalize(title);
    let want = tokens(&title_norm);
    if want.is_empty() {
        return paths.first().map(|p| p.as_ref().to_path_buf());
    }

    let mut best: Option<(usize, &Path)> = None;
    for p in paths {
        let score = stem_score(&want, p.as_ref());
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, p.as_ref()));
        }
    }
    best.map(|(_, p)| p.to_path_buf())
}
