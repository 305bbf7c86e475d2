//! Notification records emitted by the engine as workflow side effects.
//!
//! Notifications are the engine's voice toward users: assignment, approval
//! requests, status changes, comments, decisions. The engine only ever
//! creates them; the read/mark-read lifecycle belongs to whatever surface
//! displays them. Emission is fire-and-forget; a failed write is logged
//! and never fails the triggering operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ItemId;

/// A persisted notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    /// Recipient. Weak reference, lookup only.
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    /// The work item this notification is about, for audit trails.
    pub related_item_id: Option<ItemId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Warning,
    Success,
    Error,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// A notification about to be emitted. The store stamps id/created_at.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub related_item_id: Option<ItemId>,
}

impl NewNotification {
    /// "You have been assigned ...", sent to a new assignee.
    pub fn assigned(user_id: &str, item_id: ItemId, item_title: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: "New assignment".to_string(),
            message: format!("You have been assigned \"{item_title}\""),
            kind: NotificationKind::Info,
            related_item_id: Some(item_id),
        }
    }

    /// "Your approval is required ...", sent to the first pending approver.
    pub fn approval_required(user_id: &str, item_id: ItemId, item_title: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: "Approval required".to_string(),
            message: format!("Your approval is required on \"{item_title}\""),
            kind: NotificationKind::Warning,
            related_item_id: Some(item_id),
        }
    }

    /// Status change, sent to the creator.
    pub fn status_changed(
        user_id: &str,
        item_id: ItemId,
        item_title: &str,
        status: crate::model::Status,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: "Status changed".to_string(),
            message: format!("\"{item_title}\" is now {status}"),
            kind: NotificationKind::Info,
            related_item_id: Some(item_id),
        }
    }

    /// New comment, sent to assignee and creator, never the author.
    pub fn new_comment(user_id: &str, item_id: ItemId, item_title: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: "New comment".to_string(),
            message: format!("New comment on \"{item_title}\""),
            kind: NotificationKind::Info,
            related_item_id: Some(item_id),
        }
    }

    /// Approval decision, sent to the creator.
    pub fn decision(
        user_id: &str,
        item_id: ItemId,
        item_title: &str,
        approved: bool,
        role: &str,
    ) -> Self {
        let (title, kind) = if approved {
            ("Step approved", NotificationKind::Success)
        } else {
            ("Step rejected", NotificationKind::Error)
        };
        Self {
            user_id: user_id.to_string(),
            title: title.to_string(),
            message: format!(
                "{role} has {} \"{item_title}\"",
                if approved { "approved" } else { "rejected" }
            ),
            kind,
            related_item_id: Some(item_id),
        }
    }
}
