//! Authorization decisions for leave requests and user records.
//!
//! These are pure functions. Anything that depends on "is this person my
//! manager" takes the requester's manager as an argument, and callers must
//! read it from the user store at decision time.

use crate::model::{leave_request::LeaveRequest, role::Role, user::User};

/// The authenticated identity an operation runs as.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Actor {
    pub id: u64,
    pub role: Role,
}

impl Actor {
    pub fn new(id: u64, role: Role) -> Self {
        Self { id, role }
    }

    fn manages(&self, subject_manager: Option<u64>) -> bool {
        self.role == Role::Manager && subject_manager == Some(self.id)
    }
}

pub fn is_admin(role: Role) -> bool {
    role.is_admin()
}

pub fn is_manager_or_admin(role: Role) -> bool {
    role.is_manager_or_admin()
}

pub fn can_view_all_leaves(actor: &Actor) -> bool {
    is_admin(actor.role)
}

/// Gates the team views only. Scoping to direct reports is done by the caller.
pub fn can_view_team_leaves(actor: &Actor) -> bool {
    is_manager_or_admin(actor.role)
}

pub fn can_view_leave(actor: &Actor, leave: &LeaveRequest, requester_manager: Option<u64>) -> bool {
    actor.id == leave.requester || is_admin(actor.role) || actor.manages(requester_manager)
}

pub fn can_decide(actor: &Actor, requester_manager: Option<u64>) -> bool {
    is_admin(actor.role) || actor.manages(requester_manager)
}

pub fn can_cancel(actor: &Actor, leave: &LeaveRequest) -> bool {
    actor.id == leave.requester && leave.is_pending()
}

pub fn can_view_user(actor: &Actor, user: &User) -> bool {
    actor.id == user.id || is_admin(actor.role) || actor.manages(user.manager)
}
