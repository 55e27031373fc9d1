//! Error types for sitesync-core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// What is wrong with a rejected object key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDefect {
    Empty,
    LeadingSlash,
    EmptySegment,
}

impl fmt::Display for KeyDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyDefect::Empty => write!(f, "key is empty"),
            KeyDefect::LeadingSlash => write!(f, "key starts with '/'"),
            KeyDefect::EmptySegment => write!(f, "key contains an empty segment"),
        }
    }
}

/// A key failed segmentation. Indicates a corrupt inventory; never recovered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid object key {key:?}: {defect}")]
pub struct InvalidKey {
    pub key: String,
    pub defect: KeyDefect,
}

impl InvalidKey {
    pub(crate) fn new(key: &str, defect: KeyDefect) -> Self {
        Self {
            key: key.to_owned(),
            defect,
        }
    }
}

/// All errors that can arise from loading the site configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, with the file that was being read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Neither `.s3_website.yaml` nor `.s3_website.yml` exists in the directory.
    #[error("unable to find .s3_website.yaml in {path}")]
    NotFound { path: PathBuf },

    /// A cache rule is structurally wrong (e.g. both `match` and `match_regexp`).
    #[error("invalid cache rule #{index}: {message}")]
    InvalidRule { index: usize, message: String },

    /// A `maxage` duration string could not be parsed.
    #[error("unable to parse duration string: {0:?}")]
    InvalidDuration(String),

    /// A glob or regular expression failed to compile.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
