//! Error type for the core crate.
//!
//! Only configuration and persistence paths return errors. Noisy OCR input
//! never does: every input-quality problem is recovered where it happens.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatcherError>;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("recognition failed: {0}")]
    Recognition(String),
}

impl WatcherError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
