//! Playlist input: `{"meta": {...}, "tracks": [...]}` as written by the scraper,
//! or a bare array of tracks.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::models::DesiredTrack;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Playlist {
    /// Passed through to reports untouched
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub tracks: Vec<DesiredTrack>,
}

// Bare goes first: a derived struct would also accept a JSON array positionally
#[derive(Deserialize)]
#[serde(untagged)]
enum PlaylistFile {
    Bare(Vec<DesiredTrack>),
    Full(Playlist),
}

impl Playlist {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read playlist {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid playlist JSON in {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let file: PlaylistFile = serde_json::from_str(text)?;
        Ok(match file {
            PlaylistFile::Full(p) => p,
            PlaylistFile::Bare(tracks) => Playlist {
                meta: Map::new(),
                tracks,
            },
        })
    }

    fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Folder name for an export: "YYYY-MM-DD - Title", or just the title.
    /// Not yet filesystem-safe.
    pub fn folder_title(&self) -> String {
        let title = self
            .meta_str("page_title")
            .or_else(|| self.meta_str("canonical_url"))
            .unwrap_or("playlist");

        match self.meta_str("fetched_at_utc") {
            Some(fetched) if fetched.chars().count() >= 10 => {
                let date: String = fetched.chars().take(10).collect();
                format!("{} - {}", date, title)
            }
            _ => title.to_string(),
        }
    }
}
