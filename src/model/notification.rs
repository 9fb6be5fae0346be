use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    LeaveRequest,
    LeaveApproved,
    LeaveRejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u64,
    pub recipient: u64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub content: String,
    /// Leave request this notification is about.
    pub leave_id: Option<u64>,
    pub read: bool,
    pub link: Option<String>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient: u64,
    pub kind: NotificationKind,
    pub content: String,
    pub leave_id: Option<u64>,
    pub link: Option<String>,
}

impl NewNotification {
    pub fn leave_submitted(manager: u64, requester_name: &str, leave_id: u64) -> Self {
        Self {
            recipient: manager,
            kind: NotificationKind::LeaveRequest,
            content: format!("New leave request from {requester_name}"),
            leave_id: Some(leave_id),
            link: Some(format!("/manager/approvals/{leave_id}")),
        }
    }

    pub fn leave_decided(requester: u64, approved: bool, leave_id: u64) -> Self {
        let (kind, verb) = if approved {
            (NotificationKind::LeaveApproved, "approved")
        } else {
            (NotificationKind::LeaveRejected, "rejected")
        };
        Self {
            recipient: requester,
            kind,
            content: format!("Your leave request has been {verb}"),
            leave_id: Some(leave_id),
            link: Some(format!("/employee/leaves/{leave_id}")),
        }
    }
}
