//! Pipeline runner: one full pass over a file set.
//!
//! Runs the stages in order and records a gate-style result per stage:
//!
//! ```text
//! syntax ──► quality ──► bundle ──► preview
//!   │ fixes overlay the working set
//!   └ fail-fast: the first failing stage skips the rest
//! ```
//!
//! In comprehensive mode every stage whose inputs exist still runs, so the
//! diagnostics see all failures of the pass at once.

use crate::analyzer::build_analyzer;
use crate::bundler::{BundleArtifact, BundleError, Bundler};
use crate::config::{PipelineConfig, RunMode};
use crate::diagnostics::DiagnosticError;
use crate::error::{PipelineError, PipelineResult};
use crate::files::FileSet;
use crate::preview::{PreviewIssue, PreviewIssueKind, PreviewResult, PreviewService};
use crate::validation::{OutputValidator, SyntaxValidator, ValidationResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Syntax,
    Quality,
    Bundle,
    Preview,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Syntax, Stage::Quality, Stage::Bundle, Stage::Preview];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Quality => write!(f, "quality"),
            Self::Bundle => write!(f, "bundle"),
            Self::Preview => write!(f, "preview"),
        }
    }
}

/// Outcome of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Passed,
    Failed,
    /// An earlier stage failed (fail-fast) or the stage had no input
    Skipped,
    /// Passed with warnings or auto-fixes
    Warning,
}

impl StageOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed | Self::Warning)
    }
}

impl std::fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "PASS"),
            Self::Failed => write!(f, "FAIL"),
            Self::Skipped => write!(f, "SKIP"),
            Self::Warning => write!(f, "WARN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub duration_ms: u64,
    pub error_count: usize,
    pub warning_count: usize,
}

/// Everything one pass produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    /// 0 for the initial pass, n for the pass after regeneration n
    pub attempt: u32,
    pub stages: Vec<StageResult>,
    pub all_green: bool,
    pub total_duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<BundleArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_error: Option<BundleError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewResult>,
    /// Blocking errors of every stage, ready for classification
    pub errors: Vec<DiagnosticError>,
    /// Working set after syntax auto-fixes
    #[serde(skip)]
    pub files: FileSet,
}

impl PassReport {
    fn new(attempt: u32, files: FileSet) -> Self {
        Self {
            attempt,
            stages: Vec::new(),
            all_green: false,
            total_duration_ms: 0,
            entry_point: None,
            syntax: None,
            quality: None,
            bundle: None,
            bundle_error: None,
            preview: None,
            errors: Vec::new(),
            files,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.all_green
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// First failing stage, for quick triage.
    pub fn first_failure(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|s| s.outcome == StageOutcome::Failed)
            .map(|s| s.stage)
    }

    fn record(&mut self, stage: Stage, outcome: StageOutcome, started: Instant, errors: usize, warnings: usize) {
        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            stage = %stage,
            outcome = %outcome,
            attempt = self.attempt,
            duration_ms,
            errors,
            warnings,
            "Stage complete"
        );
        self.stages.push(StageResult {
            stage,
            outcome,
            duration_ms,
            error_count: errors,
            warning_count: warnings,
        });
    }

    fn skip_remaining(&mut self, from: Stage) {
        for stage in Stage::ALL.iter().skip_while(|s| **s != from) {
            self.stages.push(StageResult {
                stage: *stage,
                outcome: StageOutcome::Skipped,
                duration_ms: 0,
                error_count: 0,
                warning_count: 0,
            });
        }
    }

    fn failed(&self) -> bool {
        self.stages.iter().any(|s| s.outcome == StageOutcome::Failed)
    }

    fn finalize(&mut self, started: Instant) {
        self.total_duration_ms = started.elapsed().as_millis() as u64;
        self.all_green = !self.failed() && self.errors.is_empty();
    }
}

fn validation_outcome(result: &ValidationResult) -> StageOutcome {
    if !result.is_valid {
        StageOutcome::Failed
    } else if !result.findings.is_empty() {
        StageOutcome::Warning
    } else {
        StageOutcome::Passed
    }
}

/// Runs full passes with one set of validators, one bundler and a shared
/// preview service.
pub struct PipelineRunner {
    syntax: SyntaxValidator,
    output: OutputValidator,
    bundler: Bundler,
    preview: Arc<PreviewService>,
    mode: RunMode,
    entry_override: Option<String>,
}

impl PipelineRunner {
    pub fn new(config: &PipelineConfig, preview: Arc<PreviewService>) -> Self {
        let analyzer = build_analyzer(config.analyzer);
        Self {
            syntax: SyntaxValidator::new(Arc::clone(&analyzer)),
            output: OutputValidator::new(analyzer, config.quality.clone()),
            bundler: Bundler::new(config.bundle.clone()),
            preview,
            mode: config.mode,
            entry_override: config.entry.clone(),
        }
    }

    pub fn bundler(&self) -> &Bundler {
        &self.bundler
    }

    pub fn preview(&self) -> &Arc<PreviewService> {
        &self.preview
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    fn check_cancelled(cancel: &CancellationToken, stage: Stage) -> PipelineResult<()> {
        if cancel.is_cancelled() {
            tracing::info!(stage = %stage, "Pipeline cancelled");
            return Err(PipelineError::cancelled(stage));
        }
        Ok(())
    }

    /// Run one pass. Returns `Err` only for cancellation and preview
    /// infrastructure failures; a failing file set is an `Ok` report.
    pub async fn run(
        &self,
        files: &FileSet,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> PipelineResult<PassReport> {
        let pass_started = Instant::now();
        let fail_fast = self.mode == RunMode::FailFast;
        let mut report = PassReport::new(attempt, files.clone());

        // Syntax: repairs are applied to the working set for later stages.
        Self::check_cancelled(cancel, Stage::Syntax)?;
        let started = Instant::now();
        let syntax = self.syntax.validate(files);
        report.files = files.overlay(syntax.fixed_files.iter().cloned());
        report
            .errors
            .extend(syntax.failures().map(DiagnosticError::from_finding));
        report.record(
            Stage::Syntax,
            validation_outcome(&syntax),
            started,
            syntax.failure_count(),
            syntax.findings.len() - syntax.failure_count(),
        );
        report.syntax = Some(syntax);
        if fail_fast && report.failed() {
            report.skip_remaining(Stage::Quality);
            report.finalize(pass_started);
            return Ok(report);
        }

        Self::check_cancelled(cancel, Stage::Quality)?;
        let started = Instant::now();
        let quality = self.output.validate(&report.files);
        report
            .errors
            .extend(quality.failures().map(DiagnosticError::from_finding));
        report.record(
            Stage::Quality,
            validation_outcome(&quality),
            started,
            quality.failure_count(),
            quality.warnings().count(),
        );
        report.quality = Some(quality);
        if fail_fast && report.failed() {
            report.skip_remaining(Stage::Bundle);
            report.finalize(pass_started);
            return Ok(report);
        }

        Self::check_cancelled(cancel, Stage::Bundle)?;
        let started = Instant::now();
        report.entry_point = self
            .bundler
            .detect_entry(&report.files, self.entry_override.as_deref())
            .ok();
        match self.bundler.bundle(&report.files, self.entry_override.as_deref()) {
            Ok(artifact) => {
                report.record(Stage::Bundle, StageOutcome::Passed, started, 0, 0);
                report.bundle = Some(artifact);
            }
            Err(e) => {
                report.errors.push(DiagnosticError::from_bundle_error(&e));
                report.record(Stage::Bundle, StageOutcome::Failed, started, 1, 0);
                report.bundle_error = Some(e);
                report.skip_remaining(Stage::Preview);
                report.finalize(pass_started);
                return Ok(report);
            }
        }

        Self::check_cancelled(cancel, Stage::Preview)?;
        let started = Instant::now();
        let script = report
            .bundle
            .as_ref()
            .and_then(|b| b.code().map(|code| (code.to_string(), b.entry_point.clone())));
        match script {
            Some((code, entry)) => {
                // Dropping the render future closes its page and harness.
                let preview = tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!(stage = %Stage::Preview, "Pipeline cancelled");
                        return Err(PipelineError::cancelled(Stage::Preview));
                    }
                    result = self.preview.render(&code, &entry) => match result {
                        Ok(preview) => preview,
                        Err(e) => {
                            tracing::warn!(error = %e, entry = %entry, "Preview renderer failed");
                            PreviewResult::failed(
                                PreviewIssue::new(PreviewIssueKind::RendererFailure, e.to_string())
                                    .with_source(entry.as_str()),
                            )
                        }
                    },
                };
                report
                    .errors
                    .extend(preview.errors.iter().map(DiagnosticError::from_preview_issue));
                let outcome = if !preview.is_valid {
                    StageOutcome::Failed
                } else if !preview.warnings.is_empty() {
                    StageOutcome::Warning
                } else {
                    StageOutcome::Passed
                };
                report.record(
                    Stage::Preview,
                    outcome,
                    started,
                    preview.errors.len(),
                    preview.warnings.len(),
                );
                report.preview = Some(preview);
            }
            None => {
                tracing::debug!("Bundle has no executable script, preview skipped");
                report.skip_remaining(Stage::Preview);
            }
        }

        report.finalize(pass_started);
        Ok(report)
    }
}
