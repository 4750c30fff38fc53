//! Self-heal state machine: explicit states and legal transition guards.
//!
//! Every heal session starts at `Idle` and ends at `Healed`, `Failed` or
//! `Cancelled`. The attempt number lives inside the `Healing` and
//! `Revalidating` states, so the bound on regeneration attempts is part of
//! the transition table rather than a counter checked somewhere else.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Regeneration attempts allowed per session.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "attempt", rename_all = "snake_case")]
pub enum SelfHealStatus {
    /// No heal started; the first pass has not failed (yet).
    Idle,
    /// Waiting on the regeneration collaborator for attempt `n`.
    Healing(u32),
    /// Re-running the full pipeline on the output of attempt `n`.
    Revalidating(u32),
    /// A regenerated file set passed every stage. Terminal.
    Healed,
    /// Attempts exhausted; manual fix required. Terminal.
    Failed,
    /// Stopped by the caller. Terminal.
    Cancelled,
}

impl SelfHealStatus {
    /// Whether this is a terminal state (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Healed | Self::Failed | Self::Cancelled)
    }

    /// Attempt carried by the state, if any.
    pub fn attempt(self) -> Option<u32> {
        match self {
            Self::Healing(n) | Self::Revalidating(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for SelfHealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Healing(n) => write!(f, "healing({})", n),
            Self::Revalidating(n) => write!(f, "revalidating({})", n),
            Self::Healed => write!(f, "healed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Legal transitions between heal states for a session allowed
/// `max_attempts` regenerations.
///
/// ```text
/// Idle            → Healing(1)
/// Healing(n)      → Revalidating(n) | Healing(n+1) if n < max
/// Revalidating(n) → Healed | Healing(n+1) if n < max
/// any non-terminal → Failed | Cancelled
/// ```
pub fn is_legal_transition(from: SelfHealStatus, to: SelfHealStatus, max_attempts: u32) -> bool {
    use SelfHealStatus::*;

    if matches!(to, Failed | Cancelled) && !from.is_terminal() {
        return true;
    }

    match (from, to) {
        (Idle, Healing(1)) => max_attempts >= 1,
        (Healing(n), Revalidating(m)) => n == m,
        // A collaborator error or timeout consumes the attempt.
        (Healing(n), Healing(m)) | (Revalidating(n), Healing(m)) => {
            m == n + 1 && m <= max_attempts
        }
        (Revalidating(_), Healed) => true,
        _ => false,
    }
}

/// A single recorded state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub from: SelfHealStatus,
    pub to: SelfHealStatus,
    /// Milliseconds since the session started.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: SelfHealStatus,
    pub to: SelfHealStatus,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal heal transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Per-session heal state and its transition log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfHealState {
    /// Regenerations started so far (0 until the first heal).
    pub attempt_number: u32,
    pub max_attempts: u32,
    pub status: SelfHealStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    pub started_at: DateTime<Utc>,
    transitions: Vec<TransitionRecord>,
}

impl SelfHealState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt_number: 0,
            max_attempts,
            status: SelfHealStatus::Idle,
            last_message: None,
            started_at: Utc::now(),
            transitions: Vec::new(),
        }
    }

    /// Attempt to move to `to`, recording the transition.
    pub fn advance(
        &mut self,
        to: SelfHealStatus,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.status, to, self.max_attempts) {
            return Err(IllegalTransition {
                from: self.status,
                to,
            });
        }

        let elapsed_ms = (Utc::now() - self.started_at).num_milliseconds().max(0) as u64;
        tracing::debug!(
            from = %self.status,
            to = %to,
            max_attempts = self.max_attempts,
            "Heal state transition"
        );

        self.transitions.push(TransitionRecord {
            from: self.status,
            to,
            elapsed_ms,
            reason: reason.map(String::from),
        });
        if let Some(n) = to.attempt() {
            self.attempt_number = n;
        }
        if let Some(reason) = reason {
            self.last_message = Some(reason.to_string());
        }
        self.status = to;
        Ok(())
    }

    /// Start the next regeneration attempt.
    pub fn begin_attempt(&mut self, reason: &str) -> Result<u32, IllegalTransition> {
        let next = self.attempt_number + 1;
        self.advance(SelfHealStatus::Healing(next), Some(reason))?;
        Ok(next)
    }

    pub fn fail(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(SelfHealStatus::Failed, Some(reason))
    }

    pub fn cancel(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(SelfHealStatus::Cancelled, Some(reason))
    }

    /// Whether another regeneration may be started.
    pub fn can_retry(&self) -> bool {
        !self.status.is_terminal() && self.attempt_number < self.max_attempts
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// One-line history, e.g. `idle → failed (3/3 attempts) [healing(1) → …]`.
    pub fn summary(&self) -> String {
        let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        let mut out = format!(
            "{} → {} ({}/{} attempts)",
            SelfHealStatus::Idle,
            self.status,
            self.attempt_number,
            self.max_attempts
        );
        if !states.is_empty() {
            out.push_str(&format!(" [{}]", states.join(" → ")));
        }
        out
    }
}

impl Default for SelfHealState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SelfHealStatus::*;

    #[test]
    fn test_initial_state() {
        let state = SelfHealState::default();
        assert_eq!(state.status, Idle);
        assert_eq!(state.attempt_number, 0);
        assert_eq!(state.max_attempts, 3);
        assert!(state.can_retry());
        assert!(state.transitions().is_empty());
    }

    #[test]
    fn test_heal_on_second_attempt() {
        let mut state = SelfHealState::default();
        assert_eq!(state.begin_attempt("syntax_error").unwrap(), 1);
        state.advance(Revalidating(1), None).unwrap();
        assert_eq!(state.begin_attempt("still failing").unwrap(), 2);
        state.advance(Revalidating(2), None).unwrap();
        state.advance(Healed, Some("all stages passed")).unwrap();

        assert!(state.is_terminal());
        assert_eq!(state.attempt_number, 2);
        assert_eq!(state.transitions().len(), 5);
        assert_eq!(state.last_message.as_deref(), Some("all stages passed"));
    }

    #[test]
    fn test_attempt_bound_in_table() {
        let mut state = SelfHealState::default();
        for n in 1..=3 {
            state.begin_attempt("retry").unwrap();
            state.advance(Revalidating(n), None).unwrap();
        }
        assert!(!state.can_retry());
        let err = state.begin_attempt("one more").unwrap_err();
        assert_eq!(err.from, Revalidating(3));
        assert_eq!(err.to, Healing(4));
        state.fail("attempts exhausted").unwrap();
        assert_eq!(state.status, Failed);
    }

    #[test]
    fn test_collaborator_failure_consumes_attempt() {
        assert!(is_legal_transition(Healing(1), Healing(2), 3));
        assert!(!is_legal_transition(Healing(3), Healing(4), 3));
        assert!(!is_legal_transition(Healing(1), Healing(3), 3));
    }

    #[test]
    fn test_illegal_skip_transition() {
        let mut state = SelfHealState::default();
        assert!(state.advance(Revalidating(1), None).is_err());
        assert!(state.advance(Healed, None).is_err());
        assert!(state.advance(Healing(2), None).is_err());
        assert_eq!(state.status, Idle);
    }

    #[test]
    fn test_failure_and_cancel_from_any_non_terminal() {
        for from in [Idle, Healing(1), Revalidating(2)] {
            assert!(is_legal_transition(from, Failed, 3));
            assert!(is_legal_transition(from, Cancelled, 3));
        }
        for from in [Healed, Failed, Cancelled] {
            assert!(!is_legal_transition(from, Failed, 3));
            assert!(!is_legal_transition(from, Healing(1), 3));
        }
    }

    #[test]
    fn test_summary_and_serialization() {
        let mut state = SelfHealState::default();
        state.begin_attempt("x").unwrap();
        state.cancel("caller").unwrap();
        assert!(state.summary().contains("cancelled (1/3 attempts)"));

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"]["status"], "cancelled");
        assert_eq!(json["attemptNumber"], 1);
        assert_eq!(
            serde_json::to_value(Healing(2)).unwrap(),
            serde_json::json!({"status": "healing", "attempt": 2})
        );
    }
}
