//! Pipeline error types.

use crate::bundler::BundleError;
use crate::heal::{GeneratorError, IllegalTransition};
use crate::preview::PreviewServiceError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures of the pipeline machinery itself.
///
/// A file set that fails validation, bundling or preview is not an error
/// here; those outcomes are reported in pass results and diagnostics.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Another heal already holds this session
    #[error("Session {session_id} already has a pipeline running")]
    SessionBusy { session_id: String },

    /// Cancelled by the caller
    #[error("Pipeline cancelled during {stage}")]
    Cancelled { stage: String },

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Preview(#[from] PreviewServiceError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Transition(#[from] IllegalTransition),

    /// Configuration error
    #[error("Configuration error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn cancelled(stage: impl std::fmt::Display) -> Self {
        Self::Cancelled {
            stage: stage.to_string(),
        }
    }

    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
