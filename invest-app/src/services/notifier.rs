//! Notification fan-out
//!
//! Rows are written inside the caller's transaction; events are announced
//! only after the caller commits.

use invest_common::events::{EventBus, InvestEvent};
use invest_common::Result;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::{self, now};
use crate::models::{Notification, Role};

pub const APPROVAL_REQUIRED: &str = "approval_required";
pub const REQUEST_APPROVED: &str = "request_approved";
pub const REQUEST_REJECTED: &str = "request_rejected";
pub const CHANGES_REQUESTED: &str = "changes_requested";
pub const ANALYSIS_COMPLETED: &str = "analysis_completed";
pub const ANALYSIS_FAILED: &str = "analysis_failed";

/// Content of a notification before it is addressed
#[derive(Debug, Clone)]
pub struct Message {
    pub kind: &'static str,
    pub title: String,
    pub message: String,
    pub request_id: Option<Uuid>,
}

pub async fn notify_user(conn: &mut SqliteConnection, user_id: Uuid, message: &Message) -> Result<Notification> {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id,
        kind: message.kind.to_string(),
        title: message.title.clone(),
        message: message.message.clone(),
        request_id: message.request_id,
        read_at: None,
        created_at: now(),
    };
    db::notifications::insert_notification(&mut *conn, &notification).await?;

    Ok(notification)
}

/// Notify every active user holding `role`
pub async fn notify_role(conn: &mut SqliteConnection, role: Role, message: &Message) -> Result<Vec<Notification>> {
    let user_ids = db::users::active_user_ids_with_role(conn, role).await?;
    if user_ids.is_empty() {
        tracing::warn!(role = %role, kind = message.kind, "No active users to notify");
    }

    let mut created = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        created.push(notify_user(conn, user_id, message).await?);
    }
    Ok(created)
}

/// Broadcast `NotificationCreated` for committed notifications
pub fn announce(bus: &EventBus, notifications: &[Notification]) {
    for notification in notifications {
        bus.emit_lossy(InvestEvent::NotificationCreated {
            notification_id: notification.id,
            user_id: notification.user_id,
            title: notification.title.clone(),
            timestamp: notification.created_at,
        });
    }
}
