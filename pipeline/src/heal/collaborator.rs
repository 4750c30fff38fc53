//! Regeneration collaborator contract.
//!
//! The model call that rewrites failing files lives outside this crate.
//! The orchestrator hands it a [`RegenerationRequest`] and overlays the
//! returned files on the working set.

use crate::files::GeneratedFile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the collaborator is asked to do for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerationRequest {
    /// Prompt the files were originally generated from
    pub original_prompt: String,
    /// Classified errors, one per line
    pub error_context: String,
    /// Targeted repair instructions
    pub fix_prompt: String,
    /// 1-based attempt number
    pub attempt_number: u32,
    /// Files that should come back unchanged
    pub retained_files: Vec<String>,
    /// Current contents of the files to repair
    #[serde(default)]
    pub failed_files: Vec<GeneratedFile>,
}

/// Files produced by the collaborator. Paths not returned are carried
/// forward from the previous attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerationResponse {
    pub files: Vec<GeneratedFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl RegenerationResponse {
    pub fn new(files: Vec<GeneratedFile>) -> Self {
        Self { files, note: None }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GeneratorError {
    #[error("Regeneration timed out after {0}ms")]
    Timeout(u64),

    #[error("Regeneration request failed: {0}")]
    Request(String),

    #[error("Regeneration response could not be used: {0}")]
    InvalidResponse(String),
}

/// Produces repaired files for a failing file set.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn regenerate(
        &self,
        request: &RegenerationRequest,
    ) -> Result<RegenerationResponse, GeneratorError>;
}
