//! Typed errors raised by the matching engine before any work starts.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("library root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("library root is not a directory: {0}")]
    RootNotDirectory(PathBuf),

    #[error("no audio extensions configured")]
    NoExtensions,
}
