//! Errors raised while reading a file set from disk.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON that parsed but is not a file map or file list
    #[error("unexpected file set shape: {0}")]
    Shape(String),

    #[error("no files found in {0}")]
    Empty(PathBuf),
}
