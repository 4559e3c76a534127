//! Layered settings: struct defaults < TOML file < `PLAYLIST_MATCH__*` env vars.
//! CLI flags are applied on top by the binary.
//!
//! ```toml
//! [library]
//! root = "~/Music/Library"
//! extensions = ["mp3", "flac"]
//!
//! [matching]
//! max_candidates = 10
//!
//! [runtime]
//! workers = 8
//! ```

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::index::{IndexOptions, DEFAULT_EXTENSIONS};
use crate::resolve::{ResolveOptions, DEFAULT_MAX_CANDIDATES};

const ENV_PREFIX: &str = "PLAYLIST_MATCH";
const CONFIG_PATH_VAR: &str = "PLAYLIST_MATCH_CONFIG_PATH";
const APP_DIR: &str = "playlist-match";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub library: LibrarySettings,
    pub matching: MatchingSettings,
    pub runtime: RuntimeSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// `Artist/Album/Track.ext` tree. "~" is expanded.
    pub root: Option<String>,
    pub extensions: Vec<String>,
    pub follow_links: bool,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            root: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            follow_links: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingSettings {
    pub include_candidates: bool,
    pub max_candidates: usize,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            include_candidates: true,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Rayon pool size; 0 keeps rayon's default
    pub workers: usize,
    pub log_only: bool,
}

impl Settings {
    /// Load settings, reading `explicit` instead of the default config file when given.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ::config::ConfigError> {
        let mut builder = ::config::Config::builder();

        match explicit {
            // A path the user asked for must exist
            Some(path) => {
                builder = builder.add_source(::config::File::from(path).required(true));
            }
            None => {
                if let Some(path) = resolve_config_path() {
                    builder = builder.add_source(::config::File::from(path.as_path()).required(false));
                }
            }
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("library.extensions")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        let has_extension = self
            .library
            .extensions
            .iter()
            .any(|e| !e.trim().trim_start_matches('.').is_empty());
        if !has_extension {
            return Err("library.extensions must name at least one extension".to_string());
        }
        if self.matching.include_candidates && self.matching.max_candidates == 0 {
            return Err("matching.max_candidates must be >= 1 when candidates are enabled".to_string());
        }
        Ok(())
    }

    /// Configured library root with "~" expanded.
    pub fn library_root(&self) -> Option<PathBuf> {
        self.library
            .root
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .map(expand_path)
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            extensions: self.library.extensions.clone(),
            follow_links: self.library.follow_links,
            ..IndexOptions::default()
        }
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            include_candidates: self.matching.include_candidates,
            max_candidates: self.matching.max_candidates,
        }
    }
}

/// "~/Music" → "/home/me/Music"
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// `$PLAYLIST_MATCH_CONFIG_PATH`, else the XDG default.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os(CONFIG_PATH_VAR) {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// `$XDG_CONFIG_HOME/playlist-match/config.toml` or `~/.config/playlist-match/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    config_home(env::var_os("XDG_CONFIG_HOME"), env::var_os("HOME"))
        .map(|d| d.join(APP_DIR).join("config.toml"))
}

fn config_home(xdg: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    match (xdg, home) {
        (Some(xdg), _) if !xdg.is_empty() => Some(PathBuf::from(xdg)),
        (_, Some(home)) => Some(PathBuf::from(home).join(".config")),
        _ => None,
    }
}
