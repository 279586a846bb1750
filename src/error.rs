use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the tailing side of the crate.
///
/// Decode errors and unrecognized lines are deliberately absent: malformed
/// chunks are logged and skipped, and a line that matches no grammar is the
/// normal case, not an error.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The watch root (or a discovery candidate set) does not exist. Fatal to
    /// the watch session; the caller decides whether to retry.
    #[error("log directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("failed to stat {path}: {source}")]
    FileStat { path: PathBuf, source: io::Error },

    #[error("failed to read {path}: {source}")]
    FileRead { path: PathBuf, source: io::Error },

    #[error("filesystem watch failed: {0}")]
    Notify(#[from] notify::Error),
}
