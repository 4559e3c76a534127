//! Playlist-to-library matching - shared modules for all binaries.

pub mod error;
pub mod export;
pub mod index;
pub mod models;
pub mod normalize;
pub mod playlist;
pub mod progress;
pub mod report;
pub mod resolve;
pub mod safety;
pub mod scoring;
pub mod settings;

pub use error::MatchError;
pub use index::{IndexOptions, LibraryIndex};
pub use models::{DesiredTrack, MatchResult, MatchStatus, Strategy};
pub use resolve::{ResolveOptions, Resolver};
