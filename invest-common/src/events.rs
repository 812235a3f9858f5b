//! Event types and the in-process EventBus
//!
//! Workflow transitions, task assignments, notifications and background job
//! progress are broadcast as [`InvestEvent`]s. The SSE endpoint and tests
//! subscribe to the bus; emitting never blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Application event types
///
/// Serialized with a `type` tag for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum InvestEvent {
    /// Investment request moved between workflow states
    RequestStatusChanged {
        request_id: Uuid,
        request_code: String,
        old_status: String,
        new_status: String,
        actor_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A task was created for a role (and optionally a specific user)
    TaskAssigned {
        task_id: Uuid,
        request_id: Uuid,
        task_type: String,
        assignee_role: String,
        assignee_id: Option<Uuid>,
        timestamp: DateTime<Utc>,
    },

    NotificationCreated {
        notification_id: Uuid,
        user_id: Uuid,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// Background job advanced to a new step
    JobProgress {
        job_id: Uuid,
        document_id: Uuid,
        step: String,
        progress: u8,
        timestamp: DateTime<Utc>,
    },

    JobCompleted {
        job_id: Uuid,
        document_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Job attempt failed; `will_retry` is false once attempts are exhausted
    JobFailed {
        job_id: Uuid,
        document_id: Uuid,
        error: String,
        attempts: u32,
        will_retry: bool,
        timestamp: DateTime<Utc>,
    },
}

impl InvestEvent {
    /// Event type name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            InvestEvent::RequestStatusChanged { .. } => "RequestStatusChanged",
            InvestEvent::TaskAssigned { .. } => "TaskAssigned",
            InvestEvent::NotificationCreated { .. } => "NotificationCreated",
            InvestEvent::JobProgress { .. } => "JobProgress",
            InvestEvent::JobCompleted { .. } => "JobCompleted",
            InvestEvent::JobFailed { .. } => "JobFailed",
        }
    }

    /// User the event is addressed to, if it is private to one user
    pub fn target_user(&self) -> Option<Uuid> {
        match self {
            InvestEvent::NotificationCreated { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }
}

/// Broadcast bus for [`InvestEvent`]s
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<InvestEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<InvestEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: InvestEvent,
    ) -> Result<usize, broadcast::error::SendError<InvestEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: InvestEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_completed() -> InvestEvent {
        InvestEvent::JobCompleted {
            job_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        assert!(bus.emit(job_completed()).is_err());
        bus.emit_lossy(job_completed());
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let event = job_completed();
        assert_eq!(bus.emit(event.clone()).unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_serialized_with_type_tag() {
        let json = serde_json::to_value(job_completed()).unwrap();
        assert_eq!(json["type"], "JobCompleted");
    }

    #[test]
    fn test_notification_targets_user() {
        let user_id = Uuid::new_v4();
        let event = InvestEvent::NotificationCreated {
            notification_id: Uuid::new_v4(),
            user_id,
            title: "Approval needed".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.target_user(), Some(user_id));
        assert_eq!(job_completed().target_user(), None);
        assert_eq!(event.event_type(), "NotificationCreated");
    }
}
