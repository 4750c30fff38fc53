//! In-memory session leases.
//!
//! One pipeline runs per session at a time. A second heal for a session
//! that already holds a lease is rejected instead of queued.

use crate::error::{PipelineError, PipelineResult};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `session_id` until the returned lease is dropped.
    pub fn lease(&self, session_id: &str) -> PipelineResult<SessionLease> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(session_id.to_string()) {
            tracing::warn!(session_id, "Rejected concurrent heal for busy session");
            return Err(PipelineError::SessionBusy {
                session_id: session_id.to_string(),
            });
        }
        Ok(SessionLease {
            session_id: session_id.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(session_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Releases its session on drop, including when the owning future is
/// cancelled.
#[derive(Debug)]
pub struct SessionLease {
    session_id: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl SessionLease {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_lease_rejected_until_release() {
        let registry = SessionRegistry::new();
        let lease = registry.lease("a").unwrap();
        assert!(registry.is_active("a"));
        assert!(matches!(
            registry.lease("a"),
            Err(PipelineError::SessionBusy { .. })
        ));

        let other = registry.lease("b").unwrap();
        assert_eq!(registry.active_count(), 2);

        drop(lease);
        assert!(!registry.is_active("a"));
        assert_eq!(registry.lease("a").unwrap().session_id(), "a");
        drop(other);
    }
}
