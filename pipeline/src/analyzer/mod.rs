//! Source analysis capability shared by the validators.
//!
//! ```text
//! SyntaxValidator ──► SourceAnalyzer::detect_syntax_issues
//! OutputValidator ──► SourceAnalyzer::detect_quality_issues
//!
//!   AstAnalyzer        tree-sitter tsx/ts grammars (primary)
//!   HeuristicAnalyzer  regex + line scanners (fallback)
//! ```
//!
//! The AST analyzer treats a clean parse as proof of structural soundness and
//! only consults the line scanners to classify a parse failure. The heuristic
//! analyzer runs the scanners unconditionally and is used when the grammar
//! cannot be loaded or when configured explicitly.

pub mod ast;
pub mod heuristic;

pub use ast::AstAnalyzer;
pub use heuristic::HeuristicAnalyzer;

use crate::files::GeneratedFile;
use crate::validation::{QualityRules, ValidationFinding};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Static inspection of one source file.
pub trait SourceAnalyzer: Send + Sync {
    /// Short identifier for logs and reports.
    fn name(&self) -> &'static str;

    /// Structural defects: unterminated strings, unbalanced JSX, parse errors.
    ///
    /// Called on content that has already had import quotes repaired.
    fn detect_syntax_issues(&self, file: &GeneratedFile) -> Vec<ValidationFinding>;

    /// Convention, accessibility and styling findings.
    fn detect_quality_issues(&self, file: &GeneratedFile, rules: &QualityRules)
        -> Vec<ValidationFinding>;
}

/// Which analyzer to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    #[default]
    Ast,
    Heuristic,
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ast => write!(f, "ast"),
            Self::Heuristic => write!(f, "heuristic"),
        }
    }
}

impl std::str::FromStr for AnalyzerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ast" | "tree-sitter" | "tree_sitter" => Ok(Self::Ast),
            "heuristic" | "regex" => Ok(Self::Heuristic),
            other => Err(format!(
                "Invalid analyzer '{}'. Valid values: ast, heuristic",
                other
            )),
        }
    }
}

/// Build the configured analyzer, degrading to the heuristic one when the
/// tree-sitter grammars fail to load.
pub fn build_analyzer(kind: AnalyzerKind) -> Arc<dyn SourceAnalyzer> {
    match kind {
        AnalyzerKind::Ast => match AstAnalyzer::new() {
            Ok(analyzer) => Arc::new(analyzer),
            Err(e) => {
                tracing::warn!(error = %e, "tree-sitter grammar unavailable, using heuristic analyzer");
                Arc::new(HeuristicAnalyzer::new())
            }
        },
        AnalyzerKind::Heuristic => Arc::new(HeuristicAnalyzer::new()),
    }
}

/// 1-indexed line number of a byte offset.
pub(crate) fn line_of(content: &str, offset: usize) -> usize {
    let end = offset.min(content.len());
    content.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}
