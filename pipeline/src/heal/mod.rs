//! Bounded self-healing.
//!
//! ```text
//! pass 0 ─ fail ─► diagnose ─► Healing(1) ─► regenerate ─► Revalidating(1) ─► pass 1
//!                                                                              │
//!        Healed ◄── pass ──────────────────────────────────────────────────────┤
//!        Healing(n+1) ◄── fail, n < max ───────────────────────────────────────┤
//!        Failed (manual fix required) ◄── fail, n == max ──────────────────────┘
//! ```

pub mod collaborator;
pub mod orchestrator;
pub mod session;
pub mod state;

pub use collaborator::{CodeGenerator, GeneratorError, RegenerationRequest, RegenerationResponse};
pub use orchestrator::{HealOutcome, SelfHealOrchestrator};
pub use session::{SessionLease, SessionRegistry};
pub use state::{IllegalTransition, SelfHealState, SelfHealStatus, TransitionRecord, DEFAULT_MAX_ATTEMPTS};

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealConfig {
    /// Regenerations allowed before manual fix is required
    pub max_attempts: u32,
    /// Hard limit on one collaborator call
    pub regeneration_timeout_ms: u64,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            regeneration_timeout_ms: 120_000,
        }
    }
}

impl HealConfig {
    pub fn regeneration_timeout(&self) -> Duration {
        Duration::from_millis(self.regeneration_timeout_ms)
    }
}
