use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
pub enum LeaveType {
    #[serde(rename = "Annual Leave")]
    #[strum(serialize = "Annual Leave")]
    Annual,
    #[serde(rename = "Sick Leave")]
    #[strum(serialize = "Sick Leave")]
    Sick,
    #[serde(rename = "Personal Leave")]
    #[strum(serialize = "Personal Leave")]
    Personal,
    Bereavement,
    Other,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    /// Approved and Rejected admit no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, LeaveStatus::Pending)
    }
}

/// The two outcomes a decider may pick.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString, AsRefStr)]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for LeaveStatus {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Approved => LeaveStatus::Approved,
            Decision::Rejected => LeaveStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 42,
    "requester": 7,
    "type": "Sick Leave",
    "startDate": "2026-06-01",
    "endDate": "2026-06-01",
    "days": 1,
    "reason": "flu",
    "status": "Pending",
    "decidedBy": null,
    "decidedOn": null,
    "comments": null,
    "rejectionReason": null,
    "createdAt": "2026-05-30T08:00:00Z"
}))]
pub struct LeaveRequest {
    pub id: u64,
    /// Owning user; never changes after creation.
    pub requester: u64,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    #[schema(format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub end_date: NaiveDate,
    /// Caller supplied, not derived from the date span.
    pub days: u32,
    pub reason: String,
    pub status: LeaveStatus,
    pub decided_by: Option<u64>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub decided_on: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub rejection_reason: Option<String>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn is_pending(&self) -> bool {
        !self.status.is_terminal()
    }

    /// True once the leave period has begun relative to `today`.
    pub fn has_started(&self, today: NaiveDate) -> bool {
        self.start_date <= today
    }
}

/// A validated leave submission.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLeave {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: u32,
    pub reason: String,
}

/// Fields written when a request leaves Pending.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    pub status: LeaveStatus,
    pub decided_by: u64,
    pub decided_on: DateTime<Utc>,
    pub comments: String,
    pub rejection_reason: Option<String>,
}

impl DecisionRecord {
    pub fn new(decision: Decision, decided_by: u64, comments: String, now: DateTime<Utc>) -> Self {
        let rejection_reason = match decision {
            Decision::Rejected => Some(comments.clone()),
            Decision::Approved => None,
        };
        Self {
            status: decision.into(),
            decided_by,
            decided_on: now,
            comments,
            rejection_reason,
        }
    }

    pub fn apply(&self, leave: &mut LeaveRequest) {
        leave.status = self.status;
        leave.decided_by = Some(self.decided_by);
        leave.decided_on = Some(self.decided_on);
        leave.comments = Some(self.comments.clone());
        leave.rejection_reason = self.rejection_reason.clone();
    }
}

/// Row selection for leave listings. An empty `requesters` list matches nothing.
#[derive(Debug, Clone, Default)]
pub struct LeaveFilter {
    pub requesters: Option<Vec<u64>>,
    pub status: Option<LeaveStatus>,
}

impl LeaveFilter {
    pub fn matches(&self, leave: &LeaveRequest) -> bool {
        let by_requester = self
            .requesters
            .as_ref()
            .is_none_or(|ids| ids.contains(&leave.requester));
        let by_status = self.status.is_none_or(|s| s == leave.status);
        by_requester && by_status
    }
}
