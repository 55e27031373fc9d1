//! Error types for sitesync-sync.

use std::path::PathBuf;

use thiserror::Error;

use sitesync_core::{ConfigError, InvalidKey};

/// All errors that can arise from scanning, planning and deploying.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A key failed validation. Fatal: the inventory it came from is corrupt.
    #[error(transparent)]
    InvalidKey(#[from] InvalidKey),

    /// An error loading or compiling the site configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory walk failure (permissions, symlink loop).
    #[error("failed to scan site directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// Object keys must be UTF-8.
    #[error("path is not valid UTF-8: {}", path.display())]
    NonUtf8Path { path: PathBuf },

    /// Upload requested for a key the local scan never produced.
    #[error("no local source for object {0}")]
    MissingSource(String),

    /// JSON serialization/deserialization error (manifest, journal).
    #[error("manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
