//! Leave request lifecycle.
//!
//! ```text
//! [Pending] --decide(Approved)--> [Approved]   (terminal)
//! [Pending] --decide(Rejected)--> [Rejected]   (terminal)
//! [Pending] --cancel-------------> (deleted)
//! ```
//!
//! Every operation re-reads the stored record and the requester's current
//! manager. Writes that leave `Pending` are conditional in the store, so of two
//! racing deciders (or a decider and a canceller) exactly one wins and the
//! other gets a conflict.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    auth::policy::{self, Actor},
    error::AppError,
    model::{
        leave_request::{Decision, DecisionRecord, LeaveFilter, LeaveRequest, LeaveStatus, NewLeave},
        notification::NewNotification,
        user::UserStatus,
    },
    store::{LeaveStore, NotificationStore, Stores, UserStore},
};

const LEAVE_NOT_FOUND: &str = "Leave request not found";

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LeaveScope {
    Mine,
    Team,
    PendingTeam,
    All,
}

pub struct LeaveService {
    leaves: Arc<dyn LeaveStore>,
    users: Arc<dyn UserStore>,
    notifications: Arc<dyn NotificationStore>,
}

impl LeaveService {
    pub fn new(stores: &Stores) -> Self {
        Self {
            leaves: stores.leaves.clone(),
            users: stores.users.clone(),
            notifications: stores.notifications.clone(),
        }
    }

    /// Stores a new `Pending` request for `actor` and tells their manager.
    pub async fn create(&self, actor: &Actor, new: NewLeave) -> Result<LeaveRequest, AppError> {
        let requester = self
            .users
            .get(actor.id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        let leave = self.leaves.insert(actor.id, new).await?;
        info!(leave_id = leave.id, requester = actor.id, "Leave request created");

        if let Some(manager) = requester.manager {
            self.notify(NewNotification::leave_submitted(
                manager,
                &requester.full_name,
                leave.id,
            ))
            .await;
        }

        Ok(leave)
    }

    /// Moves a `Pending` request to Approved or Rejected.
    pub async fn transition_status(
        &self,
        actor: &Actor,
        leave_id: u64,
        decision: Decision,
        comments: &str,
    ) -> Result<LeaveRequest, AppError> {
        let comments = comments.trim();
        if comments.is_empty() {
            return Err(AppError::field("comments", "Comments are required"));
        }

        let leave = self.load(leave_id).await?;
        let requester_manager = self.current_manager(leave.requester).await?;

        if !policy::can_decide(actor, requester_manager) {
            return Err(AppError::forbidden("Not authorized to update this leave request"));
        }
        if !leave.is_pending() {
            return Err(AppError::conflict("Leave request has already been decided"));
        }

        let record = DecisionRecord::new(decision, actor.id, comments.to_string(), Utc::now());
        let decided = match self.leaves.decide_if_pending(leave_id, &record).await? {
            Some(l) => l,
            None => return Err(self.lost_race(leave_id).await?),
        };
        info!(
            leave_id,
            decided_by = actor.id,
            status = %decided.status,
            "Leave request decided"
        );

        let approved = decided.status == LeaveStatus::Approved;
        self.notify(NewNotification::leave_decided(decided.requester, approved, decided.id))
            .await;

        if approved && decided.has_started(Utc::now().date_naive()) {
            // separate write; a failure leaves the decision in place
            if let Err(e) = self.users.set_status(decided.requester, UserStatus::OnLeave).await {
                error!(
                    error = %e,
                    user_id = decided.requester,
                    leave_id,
                    "Failed to mark requester as on leave"
                );
            }
        }

        Ok(decided)
    }

    /// Deletes the actor's own `Pending` request.
    pub async fn cancel(&self, actor: &Actor, leave_id: u64) -> Result<(), AppError> {
        let leave = self.load(leave_id).await?;

        if !policy::can_cancel(actor, &leave) {
            return Err(if actor.id != leave.requester {
                AppError::forbidden("Not authorized to cancel this leave request")
            } else {
                AppError::conflict("Can only cancel pending leave requests")
            });
        }

        if !self.leaves.delete_if_pending(leave_id, actor.id).await? {
            return Err(self.lost_race(leave_id).await?);
        }
        info!(leave_id, requester = actor.id, "Leave request cancelled");
        Ok(())
    }

    pub async fn list_for(
        &self,
        actor: &Actor,
        scope: LeaveScope,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        let filter = match scope {
            LeaveScope::Mine => LeaveFilter {
                requesters: Some(vec![actor.id]),
                status: None,
            },
            LeaveScope::Team | LeaveScope::PendingTeam => {
                if !policy::can_view_team_leaves(actor) {
                    return Err(AppError::forbidden("Access denied. Manager role required"));
                }
                let reports = self.users.direct_reports(actor.id).await?;
                LeaveFilter {
                    requesters: Some(reports.iter().map(|u| u.id).collect()),
                    status: (scope == LeaveScope::PendingTeam).then_some(LeaveStatus::Pending),
                }
            }
            LeaveScope::All => {
                if !policy::can_view_all_leaves(actor) {
                    return Err(AppError::forbidden("Access denied. Admin role required"));
                }
                LeaveFilter::default()
            }
        };

        Ok(self.leaves.list(&filter).await?)
    }

    pub async fn get_by_id(&self, actor: &Actor, leave_id: u64) -> Result<LeaveRequest, AppError> {
        let leave = self.load(leave_id).await?;
        let requester_manager = self.current_manager(leave.requester).await?;

        if !policy::can_view_leave(actor, &leave, requester_manager) {
            return Err(AppError::forbidden("Not authorized to view this leave request"));
        }
        Ok(leave)
    }

    async fn load(&self, leave_id: u64) -> Result<LeaveRequest, AppError> {
        self.leaves
            .get(leave_id)
            .await?
            .ok_or_else(|| AppError::not_found(LEAVE_NOT_FOUND))
    }

    async fn current_manager(&self, user_id: u64) -> Result<Option<u64>, AppError> {
        Ok(self.users.get(user_id).await?.and_then(|u| u.manager))
    }

    /// Explains why a conditional write matched nothing.
    async fn lost_race(&self, leave_id: u64) -> Result<AppError, AppError> {
        Ok(match self.leaves.get(leave_id).await? {
            Some(_) => AppError::conflict("Leave request has already been decided"),
            None => AppError::not_found(LEAVE_NOT_FOUND),
        })
    }

    async fn notify(&self, notification: NewNotification) {
        let recipient = notification.recipient;
        let kind = notification.kind;
        if let Err(e) = self.notifications.insert(notification).await {
            warn!(error = %e, recipient, kind = %kind, "Dropped notification");
        }
    }
}
