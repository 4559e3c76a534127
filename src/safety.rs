//! Safety checks run before anything is written.
//!
//! Exports copy into a fresh folder and reports are plain JSON, so the only way
//! to lose data is to write over the inputs: the library or the playlist file.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::index::normalize_extension;

/// Validates that a report or manifest path does not clobber an input.
///
/// Checks:
/// - Output cannot be the same file as any of `sources`
/// - Output cannot carry one of the library's `audio_extensions` (it would replace a track)
pub fn validate_output_path(
    output: &Path,
    sources: &[&Path],
    audio_extensions: &[String],
) -> Result<()> {
    let resolved = absolute(output);
    for source in sources {
        if resolved == absolute(source) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as input '{}'",
                output.display(),
                source.display()
            );
        }
    }

    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
        .unwrap_or_default();
    if !ext.is_empty() && audio_extensions.iter().any(|a| normalize_extension(a) == ext) {
        bail!(
            "Safety check failed: output '{}' has an audio extension",
            output.display()
        );
    }

    Ok(())
}

/// Validates an export destination.
///
/// Checks:
/// - Target cannot be the library root or anywhere inside it
/// - The manifest written into the destination cannot be the input playlist
pub fn validate_export_target(target: &Path, library_root: &Path, playlist: &Path) -> Result<()> {
    let target_abs = absolute(target);
    let root_abs = absolute(library_root);

    if target_abs.starts_with(&root_abs) {
        bail!(
            "Safety check failed: export target '{}' is inside the library root '{}'",
            target.display(),
            library_root.display()
        );
    }

    let playlist_abs = absolute(playlist);
    if playlist_abs.file_name().map_or(false, |n| n == "manifest.json")
        && playlist_abs.parent().map_or(false, |dir| dir.starts_with(&target_abs))
    {
        bail!(
            "Safety check failed: playlist '{}' would be overwritten by the export manifest",
            playlist.display()
        );
    }

    Ok(())
}

/// Best-effort canonical form: canonicalize the longest existing ancestor and
/// re-append the rest, so paths that do not exist yet still compare correctly.
fn absolute(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut rest: Vec<&std::ffi::OsStr> = Vec::new();
    loop {
        // "report.json" has an empty parent, which means the working directory
        let lookup = if existing.as_os_str().is_empty() {
            Path::new(".")
        } else {
            existing
        };
        if let Ok(canon) = lookup.canonicalize() {
            return rest.iter().rev().fold(canon, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name);
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}
