//! Self-heal orchestrator: diagnose, regenerate, revalidate, at most
//! `max_attempts` times per session.

use super::collaborator::{CodeGenerator, GeneratorError, RegenerationRequest, RegenerationResponse};
use super::session::SessionRegistry;
use super::state::{SelfHealState, SelfHealStatus};
use super::HealConfig;
use crate::bundler::BundleArtifact;
use crate::diagnostics::{DiagnosticClassifier, DiagnosticReport};
use crate::error::{PipelineError, PipelineResult};
use crate::events::{EventBus, HealEvent, SharedEventBus};
use crate::files::FileSet;
use crate::runner::{PassReport, PipelineRunner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Final result of a heal session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealOutcome {
    pub session_id: String,
    pub is_valid: bool,
    pub manual_fix_required: bool,
    /// Root cause addressed by the regeneration that made the set pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_applied: Option<String>,
    pub state: SelfHealState,
    /// Working set after the last pass (or at cancellation)
    pub files: FileSet,
    /// Bundle of the passing file set; absent unless `is_valid`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<BundleArtifact>,
    pub passes: Vec<PassReport>,
    /// One report per failed pass, in order
    pub diagnostics: Vec<DiagnosticReport>,
}

impl HealOutcome {
    /// Regenerations started during the session.
    pub fn regenerations(&self) -> u32 {
        self.state.attempt_number
    }

    pub fn last_diagnostic(&self) -> Option<&DiagnosticReport> {
        self.diagnostics.last()
    }
}

/// Accumulated evidence while a session runs.
struct Trail {
    working: FileSet,
    passes: Vec<PassReport>,
    diagnostics: Vec<DiagnosticReport>,
    fix_applied: Option<String>,
}

pub struct SelfHealOrchestrator {
    runner: Arc<PipelineRunner>,
    generator: Arc<dyn CodeGenerator>,
    classifier: DiagnosticClassifier,
    config: HealConfig,
    sessions: SessionRegistry,
    events: SharedEventBus,
}

impl SelfHealOrchestrator {
    pub fn new(
        runner: Arc<PipelineRunner>,
        generator: Arc<dyn CodeGenerator>,
        config: HealConfig,
    ) -> Self {
        Self {
            runner,
            generator,
            classifier: DiagnosticClassifier::new(),
            config,
            sessions: SessionRegistry::new(),
            events: EventBus::new().shared(),
        }
    }

    pub fn with_events(mut self, events: SharedEventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn config(&self) -> &HealConfig {
        &self.config
    }

    /// Run the pipeline over `files` and heal failures.
    ///
    /// Returns `Err(SessionBusy)` when the session already has a heal in
    /// flight. Cancellation is reported as an outcome with status
    /// `cancelled`; other `Err`s are infrastructure failures.
    pub async fn heal(
        &self,
        session_id: &str,
        original_prompt: &str,
        files: FileSet,
        cancel: &CancellationToken,
    ) -> PipelineResult<HealOutcome> {
        let _lease = self.sessions.lease(session_id)?;
        let mut state = SelfHealState::new(self.config.max_attempts);
        let mut trail = Trail {
            working: files,
            passes: Vec::new(),
            diagnostics: Vec::new(),
            fix_applied: None,
        };

        tracing::info!(
            session_id,
            files = trail.working.len(),
            max_attempts = state.max_attempts,
            "Heal session started"
        );

        match self
            .drive(session_id, original_prompt, &mut state, &mut trail, cancel)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {
                if !state.is_terminal() {
                    state.cancel(&e.to_string())?;
                    self.publish(session_id, &state);
                }
            }
            Err(e) => {
                tracing::error!(session_id, error = %e, status = %state.status, "Heal session aborted");
                return Err(e);
            }
        }

        let is_valid = match state.status {
            SelfHealStatus::Healed => true,
            SelfHealStatus::Idle => trail.passes.last().is_some_and(|p| p.is_valid()),
            _ => false,
        };
        let bundle = if is_valid {
            trail.passes.last().and_then(|p| p.bundle.clone())
        } else {
            None
        };

        tracing::info!(
            session_id,
            valid = is_valid,
            summary = %state.summary(),
            "Heal session finished"
        );

        Ok(HealOutcome {
            session_id: session_id.to_string(),
            is_valid,
            manual_fix_required: state.status == SelfHealStatus::Failed,
            fix_applied: trail.fix_applied,
            state,
            files: trail.working,
            bundle,
            passes: trail.passes,
            diagnostics: trail.diagnostics,
        })
    }

    async fn drive(
        &self,
        session_id: &str,
        original_prompt: &str,
        state: &mut SelfHealState,
        trail: &mut Trail,
        cancel: &CancellationToken,
    ) -> PipelineResult<()> {
        let Some(mut report) = self.run_pass(trail, 0, cancel).await? else {
            return Ok(());
        };

        loop {
            if !state.can_retry() {
                let message = format!(
                    "{} regeneration attempt(s) exhausted; manual fix required. Last failure: {}",
                    state.max_attempts, report.summary
                );
                state.fail(&message)?;
                self.publish(session_id, state);
                tracing::warn!(session_id, attempts = state.attempt_number, "Self-heal failed");
                return Ok(());
            }

            let attempt = state.begin_attempt(&report.summary)?;
            self.publish(session_id, state);
            tracing::info!(
                session_id,
                attempt,
                max_attempts = state.max_attempts,
                category = %report.category,
                failed_files = report.failed_files.len(),
                "Requesting regeneration"
            );

            let request = build_request(original_prompt, &report, &trail.working, attempt);
            match self.regenerate(&request, cancel).await? {
                Ok(response) => {
                    trail.working = trail.working.overlay(response.files);
                    state.advance(
                        SelfHealStatus::Revalidating(attempt),
                        Some("regenerated files received"),
                    )?;
                    self.publish(session_id, state);

                    match self.run_pass(trail, attempt, cancel).await? {
                        None => {
                            trail.fix_applied = Some(report.root_cause.clone());
                            state.advance(
                                SelfHealStatus::Healed,
                                Some(&format!("all stages passed after attempt {}", attempt)),
                            )?;
                            self.publish(session_id, state);
                            return Ok(());
                        }
                        Some(next) => report = next,
                    }
                }
                Err(e) => {
                    tracing::warn!(session_id, attempt, error = %e, "Regeneration attempt failed");
                    state.last_message = Some(e.to_string());
                }
            }
        }
    }

    /// Run one pass and record it. Returns the diagnosis when it failed.
    async fn run_pass(
        &self,
        trail: &mut Trail,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> PipelineResult<Option<DiagnosticReport>> {
        let pass = self.runner.run(&trail.working, attempt, cancel).await?;
        trail.working = pass.files.clone();

        let report = if pass.is_valid() {
            None
        } else {
            self.classifier.diagnose(
                pass.errors.clone(),
                &pass.files,
                pass.entry_point.as_deref(),
                attempt,
            )
        };
        trail.passes.push(pass);
        if let Some(report) = &report {
            trail.diagnostics.push(report.clone());
        }
        Ok(report)
    }

    /// Call the collaborator under the regeneration timeout. The outer
    /// `Err` is cancellation; the inner one is a failed attempt.
    async fn regenerate(
        &self,
        request: &RegenerationRequest,
        cancel: &CancellationToken,
    ) -> PipelineResult<Result<RegenerationResponse, GeneratorError>> {
        let timeout_ms = self.config.regeneration_timeout_ms;
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::cancelled("regeneration")),
            result = tokio::time::timeout(
                self.config.regeneration_timeout(),
                self.generator.regenerate(request),
            ) => result,
        };

        Ok(match result {
            Ok(Ok(response)) if response.files.is_empty() => Err(
                GeneratorError::InvalidResponse("no files returned".to_string()),
            ),
            Ok(response) => response,
            Err(_) => Err(GeneratorError::Timeout(timeout_ms)),
        })
    }

    fn publish(&self, session_id: &str, state: &SelfHealState) {
        self.events.publish(HealEvent::from_state(session_id, state));
    }
}

fn build_request(
    original_prompt: &str,
    report: &DiagnosticReport,
    working: &FileSet,
    attempt: u32,
) -> RegenerationRequest {
    RegenerationRequest {
        original_prompt: original_prompt.to_string(),
        error_context: report.error_context(),
        fix_prompt: report.fix_prompt(),
        attempt_number: attempt,
        retained_files: report.retained_files.clone(),
        failed_files: report
            .failed_files
            .iter()
            .filter_map(|p| working.get(p).cloned())
            .collect(),
    }
}
