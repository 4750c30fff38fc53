//! Heal progress events.
//!
//! Pub/sub over a tokio broadcast channel so callers can display
//! `attempt/max` progress while a heal session runs. Publishing never fails
//! for lack of subscribers.

use crate::heal::{SelfHealState, SelfHealStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Snapshot of a session's heal state at one transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealEvent {
    pub session_id: String,
    pub attempt: u32,
    pub max_attempts: u32,
    pub status: SelfHealStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealEvent {
    pub fn from_state(session_id: &str, state: &SelfHealState) -> Self {
        Self {
            session_id: session_id.to_string(),
            attempt: state.attempt_number,
            max_attempts: state.max_attempts,
            status: state.status,
            message: state.last_message.clone(),
            timestamp: Utc::now(),
        }
    }

    /// `attempt/max` label for progress displays.
    pub fn progress(&self) -> String {
        format!("{}/{}", self.attempt, self.max_attempts)
    }
}

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

pub struct EventBus {
    sender: broadcast::Sender<HealEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: HealEvent) {
        let status = event.status;
        match self.sender.send(event) {
            Ok(count) => tracing::debug!(status = %status, receivers = count, "Heal event published"),
            Err(_) => tracing::debug!(status = %status, "Heal event published (no receivers)"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let mut state = SelfHealState::default();
        state.begin_attempt("syntax_error in src/App.tsx").unwrap();
        bus.publish(HealEvent::from_state("s1", &state));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.session_id, "s1");
        assert_eq!(event.status, SelfHealStatus::Healing(1));
        assert_eq!(event.progress(), "1/3");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(HealEvent::from_state("s1", &SelfHealState::default()));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
