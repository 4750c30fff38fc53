//! Verification pipeline for generated app files.
//!
//! Turns a set of AI-produced source files into a verified, runnable
//! artifact:
//!
//! - `validation`: syntax repair/detection and project-convention linting,
//!   backed by a pluggable `analyzer` (tree-sitter or heuristic)
//! - `bundler`: module resolution and bundling over an in-memory file set
//! - `preview`: rendering in an isolated headless browser page
//! - `diagnostics`: classification of failures into a repair plan
//! - `heal`: bounded regeneration loop (at most 3 attempts per session)
//!
//! # Usage
//!
//! ```no_run
//! use pipeline::{FileSet, PipelineConfig, PipelineRunner, PreviewService};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> pipeline::PipelineResult<()> {
//! let config = PipelineConfig::default();
//! let preview = Arc::new(PreviewService::new(config.preview.clone()));
//! let runner = PipelineRunner::new(&config, Arc::clone(&preview));
//!
//! let files = FileSet::from_map([("src/App.tsx", "export default () => <h1>Hi</h1>;")]);
//! let pass = runner.run(&files, 0, &CancellationToken::new()).await?;
//! println!("valid: {}", pass.is_valid());
//! preview.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod analyzer;
pub mod bundler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod files;
pub mod heal;
pub mod preview;
pub mod runner;
pub mod validation;

pub use analyzer::{build_analyzer, AnalyzerKind, AstAnalyzer, HeuristicAnalyzer, SourceAnalyzer};
pub use bundler::{
    BundleArtifact, BundleConfig, BundleError, BundleErrorKind, BundleOutput, BundleStrategy,
    Bundler,
};
pub use config::{PipelineConfig, RunMode};
pub use diagnostics::{
    DiagnosticClassifier, DiagnosticError, DiagnosticReport, ErrorCategory, ErrorOrigin, Severity,
};
pub use error::{PipelineError, PipelineResult};
pub use events::{EventBus, HealEvent, SharedEventBus};
pub use files::{FileSet, GeneratedFile, Language};
pub use heal::{
    CodeGenerator, GeneratorError, HealConfig, HealOutcome, RegenerationRequest,
    RegenerationResponse, SelfHealOrchestrator, SelfHealState, SelfHealStatus, SessionRegistry,
};
pub use preview::{
    PreviewConfig, PreviewIssue, PreviewIssueKind, PreviewResult, PreviewService,
    PreviewServiceError,
};
pub use runner::{PassReport, PipelineRunner, Stage, StageOutcome, StageResult};
pub use validation::{
    FindingKind, OutputValidator, QualityRules, SyntaxValidator, ValidationFinding,
    ValidationResult,
};
