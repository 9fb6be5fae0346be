//! Persistence seams for users, leave requests and notifications.
//!
//! Every backend must provide the conditional writes used by the leave
//! lifecycle: a decision or cancellation only lands while the stored status is
//! still `Pending`, so two racing writers cannot both succeed.

use std::sync::Arc;

use async_trait::async_trait;
use derive_more::Display;
use sqlx::MySqlPool;

use crate::model::{
    leave_request::{DecisionRecord, LeaveFilter, LeaveRequest, NewLeave},
    notification::{NewNotification, Notification},
    user::{NewUser, ProfileUpdate, User, UserStatus, UserUpdate},
};

pub mod memory;
pub mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

#[derive(Debug, Display)]
pub enum StoreError {
    #[display(fmt = "database error: {}", _0)]
    Database(sqlx::Error),
    #[display(fmt = "{}", _0)]
    Duplicate(String),
    #[display(fmt = "corrupt record: {}", _0)]
    Corrupt(String),
    #[display(fmt = "store lock poisoned")]
    Poisoned,
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the email is taken.
    async fn insert(&self, new: NewUser) -> StoreResult<User>;

    async fn get(&self, id: u64) -> StoreResult<Option<User>>;

    /// The user together with their stored password hash.
    async fn find_credentials(&self, email: &str) -> StoreResult<Option<(User, String)>>;

    async fn password_hash(&self, id: u64) -> StoreResult<Option<String>>;

    async fn list(&self) -> StoreResult<Vec<User>>;

    /// Users whose `manager` is `manager_id`, ordered by full name.
    async fn direct_reports(&self, manager_id: u64) -> StoreResult<Vec<User>>;

    async fn set_status(&self, id: u64, status: UserStatus) -> StoreResult<bool>;

    async fn set_password(&self, id: u64, password_hash: String) -> StoreResult<bool>;

    async fn update_profile(&self, id: u64, patch: ProfileUpdate) -> StoreResult<Option<User>>;

    async fn update(&self, id: u64, patch: UserUpdate) -> StoreResult<Option<User>>;

    /// Removes the user along with their leave requests and notifications.
    async fn delete(&self, id: u64) -> StoreResult<bool>;
}

#[async_trait]
pub trait LeaveStore: Send + Sync {
    /// Persists a new request in `Pending`.
    async fn insert(&self, requester: u64, new: NewLeave) -> StoreResult<LeaveRequest>;

    async fn get(&self, id: u64) -> StoreResult<Option<LeaveRequest>>;

    /// Matching requests, newest first.
    async fn list(&self, filter: &LeaveFilter) -> StoreResult<Vec<LeaveRequest>>;

    /// Applies `decision` only if the request is still `Pending`. Returns the
    /// updated record, or `None` when nothing matched.
    async fn decide_if_pending(
        &self,
        id: u64,
        decision: &DecisionRecord,
    ) -> StoreResult<Option<LeaveRequest>>;

    /// Deletes the request only if it is owned by `requester` and still
    /// `Pending`.
    async fn delete_if_pending(&self, id: u64, requester: u64) -> StoreResult<bool>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, new: NewNotification) -> StoreResult<Notification>;

    async fn get(&self, id: u64) -> StoreResult<Option<Notification>>;

    /// Newest first.
    async fn list_for(&self, recipient: u64) -> StoreResult<Vec<Notification>>;

    async fn mark_read(&self, id: u64) -> StoreResult<bool>;

    /// Marks every unread notification of `recipient` as read and returns how
    /// many changed.
    async fn mark_all_read(&self, recipient: u64) -> StoreResult<u64>;
}

/// The three stores the application runs on, usually backed by one value.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub leaves: Arc<dyn LeaveStore>,
    pub notifications: Arc<dyn NotificationStore>,
}

impl Stores {
    pub fn mysql(pool: MySqlPool) -> Self {
        let store = Arc::new(MySqlStore::new(pool));
        Self {
            users: store.clone(),
            leaves: store.clone(),
            notifications: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::default()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            leaves: store.clone(),
            notifications: store,
        }
    }
}
