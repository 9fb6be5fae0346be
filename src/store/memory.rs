//! Process-local backend used for development (`STORE_BACKEND=memory`) and
//! by the test suite.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::{LeaveStore, NotificationStore, StoreError, StoreResult, UserStore};
use crate::model::{
    leave_request::{DecisionRecord, LeaveFilter, LeaveRequest, LeaveStatus, NewLeave},
    notification::{NewNotification, Notification},
    user::{NewUser, ProfileUpdate, User, UserStatus, UserUpdate},
};

#[derive(Default)]
struct State {
    next_id: u64,
    users: BTreeMap<u64, (User, String)>,
    leaves: BTreeMap<u64, LeaveRequest>,
    notifications: BTreeMap<u64, Notification>,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, new: NewUser) -> StoreResult<User> {
        let mut state = self.lock()?;
        let email = new.email.to_lowercase();
        if state.users.values().any(|(u, _)| u.email == email) {
            return Err(StoreError::Duplicate("User".to_string()));
        }

        let id = state.allocate_id();
        let user = User {
            id,
            full_name: new.full_name,
            email,
            role: new.role,
            manager: new.manager,
            department: new.department,
            position: new.position,
            status: UserStatus::Active,
            phone: None,
            address: None,
            bio: None,
            created_at: Utc::now(),
        };
        state.users.insert(id, (user.clone(), new.password_hash));
        Ok(user)
    }

    async fn get(&self, id: u64) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.get(&id).map(|(u, _)| u.clone()))
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<(User, String)>> {
        let email = email.to_lowercase();
        Ok(self
            .lock()?
            .users
            .values()
            .find(|(u, _)| u.email == email)
            .cloned())
    }

    async fn password_hash(&self, id: u64) -> StoreResult<Option<String>> {
        Ok(self.lock()?.users.get(&id).map(|(_, h)| h.clone()))
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        Ok(self.lock()?.users.values().map(|(u, _)| u.clone()).collect())
    }

    async fn direct_reports(&self, manager_id: u64) -> StoreResult<Vec<User>> {
        let mut reports: Vec<User> = self
            .lock()?
            .users
            .values()
            .filter(|(u, _)| u.reports_to(manager_id))
            .map(|(u, _)| u.clone())
            .collect();
        reports.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(reports)
    }

    async fn set_status(&self, id: u64, status: UserStatus) -> StoreResult<bool> {
        let mut state = self.lock()?;
        Ok(match state.users.get_mut(&id) {
            Some((user, _)) => {
                user.status = status;
                true
            }
            None => false,
        })
    }

    async fn set_password(&self, id: u64, password_hash: String) -> StoreResult<bool> {
        let mut state = self.lock()?;
        Ok(match state.users.get_mut(&id) {
            Some((_, hash)) => {
                *hash = password_hash;
                true
            }
            None => false,
        })
    }

    async fn update_profile(&self, id: u64, patch: ProfileUpdate) -> StoreResult<Option<User>> {
        let mut state = self.lock()?;
        Ok(state.users.get_mut(&id).map(|(user, _)| {
            patch.apply(user);
            user.clone()
        }))
    }

    async fn update(&self, id: u64, mut patch: UserUpdate) -> StoreResult<Option<User>> {
        let mut state = self.lock()?;
        if let Some(email) = patch.email.as_mut() {
            *email = email.to_lowercase();
            if state
                .users
                .values()
                .any(|(u, _)| u.id != id && u.email == *email)
            {
                return Err(StoreError::Duplicate("User".to_string()));
            }
        }
        Ok(state.users.get_mut(&id).map(|(user, _)| {
            patch.apply(user);
            user.clone()
        }))
    }

    async fn delete(&self, id: u64) -> StoreResult<bool> {
        let mut state = self.lock()?;
        if state.users.remove(&id).is_none() {
            return Ok(false);
        }
        let removed_leaves: Vec<u64> = state
            .leaves
            .values()
            .filter(|l| l.requester == id)
            .map(|l| l.id)
            .collect();
        state.leaves.retain(|_, l| l.requester != id);
        state.notifications.retain(|_, n| {
            n.recipient != id && !n.leave_id.is_some_and(|l| removed_leaves.contains(&l))
        });

        // mirrors the ON DELETE SET NULL foreign keys in schema.sql
        for (user, _) in state.users.values_mut() {
            if user.manager == Some(id) {
                user.manager = None;
            }
        }
        for leave in state.leaves.values_mut() {
            if leave.decided_by == Some(id) {
                leave.decided_by = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl LeaveStore for MemoryStore {
    async fn insert(&self, requester: u64, new: NewLeave) -> StoreResult<LeaveRequest> {
        let mut state = self.lock()?;
        let id = state.allocate_id();
        let leave = LeaveRequest {
            id,
            requester,
            leave_type: new.leave_type,
            start_date: new.start_date,
            end_date: new.end_date,
            days: new.days,
            reason: new.reason,
            status: LeaveStatus::Pending,
            decided_by: None,
            decided_on: None,
            comments: None,
            rejection_reason: None,
            created_at: Utc::now(),
        };
        state.leaves.insert(id, leave.clone());
        Ok(leave)
    }

    async fn get(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.lock()?.leaves.get(&id).cloned())
    }

    async fn list(&self, filter: &LeaveFilter) -> StoreResult<Vec<LeaveRequest>> {
        let mut leaves: Vec<LeaveRequest> = self
            .lock()?
            .leaves
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        leaves.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(leaves)
    }

    async fn decide_if_pending(
        &self,
        id: u64,
        decision: &DecisionRecord,
    ) -> StoreResult<Option<LeaveRequest>> {
        let mut state = self.lock()?;
        Ok(match state.leaves.get_mut(&id) {
            Some(leave) if leave.is_pending() => {
                decision.apply(leave);
                Some(leave.clone())
            }
            _ => None,
        })
    }

    async fn delete_if_pending(&self, id: u64, requester: u64) -> StoreResult<bool> {
        let mut state = self.lock()?;
        let removable = state
            .leaves
            .get(&id)
            .is_some_and(|l| l.requester == requester && l.is_pending());
        if removable {
            state.leaves.remove(&id);
        }
        Ok(removable)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert(&self, new: NewNotification) -> StoreResult<Notification> {
        let mut state = self.lock()?;
        let id = state.allocate_id();
        let notification = Notification {
            id,
            recipient: new.recipient,
            kind: new.kind,
            content: new.content,
            leave_id: new.leave_id,
            read: false,
            link: new.link,
            created_at: Utc::now(),
        };
        state.notifications.insert(id, notification.clone());
        Ok(notification)
    }

    async fn get(&self, id: u64) -> StoreResult<Option<Notification>> {
        Ok(self.lock()?.notifications.get(&id).cloned())
    }

    async fn list_for(&self, recipient: u64) -> StoreResult<Vec<Notification>> {
        let mut found: Vec<Notification> = self
            .lock()?
            .notifications
            .values()
            .filter(|n| n.recipient == recipient)
            .cloned()
            .collect();
        found.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(found)
    }

    async fn mark_read(&self, id: u64) -> StoreResult<bool> {
        let mut state = self.lock()?;
        Ok(match state.notifications.get_mut(&id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        })
    }

    async fn mark_all_read(&self, recipient: u64) -> StoreResult<u64> {
        let mut state = self.lock()?;
        let mut changed = 0;
        for n in state.notifications.values_mut() {
            if n.recipient == recipient && !n.read {
                n.read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
