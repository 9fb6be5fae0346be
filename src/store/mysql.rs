use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, MySqlPool};

use super::{LeaveStore, NotificationStore, StoreError, StoreResult, UserStore};
use crate::model::{
    leave_request::{DecisionRecord, LeaveFilter, LeaveRequest, LeaveStatus, NewLeave},
    notification::{NewNotification, Notification},
    user::{NewUser, ProfileUpdate, User, UserStatus, UserUpdate},
};

const USER_COLUMNS: &str = "id, full_name, email, role, manager_id, department, position, \
                            status, phone, address, bio, created_at";

const LEAVE_COLUMNS: &str = "id, requester_id, leave_type, start_date, end_date, days, reason, \
                             status, decided_by, decided_on, comments, rejection_reason, created_at";

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, kind, content, leave_id, is_read, link, created_at";

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn is_duplicate(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23000"))
}

fn parse_column<T: FromStr>(column: &str, value: &str) -> StoreResult<T> {
    value
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("{column} = {value:?}")))
}

#[derive(FromRow)]
struct UserRow {
    id: u64,
    full_name: String,
    email: String,
    role: String,
    manager_id: Option<u64>,
    department: Option<String>,
    position: Option<String>,
    status: String,
    phone: Option<String>,
    address: Option<String>,
    bio: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        Ok(User {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            role: parse_column("users.role", &row.role)?,
            manager: row.manager_id,
            department: row.department,
            position: row.position,
            status: parse_column("users.status", &row.status)?,
            phone: row.phone,
            address: row.address,
            bio: row.bio,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    requester_id: u64,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    days: u32,
    reason: String,
    status: String,
    decided_by: Option<u64>,
    decided_on: Option<DateTime<Utc>>,
    comments: Option<String>,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = StoreError;

    fn try_from(row: LeaveRow) -> StoreResult<Self> {
        Ok(LeaveRequest {
            id: row.id,
            requester: row.requester_id,
            leave_type: parse_column("leave_requests.leave_type", &row.leave_type)?,
            start_date: row.start_date,
            end_date: row.end_date,
            days: row.days,
            reason: row.reason,
            status: parse_column("leave_requests.status", &row.status)?,
            decided_by: row.decided_by,
            decided_on: row.decided_on,
            comments: row.comments,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct NotificationRow {
    id: u64,
    recipient_id: u64,
    kind: String,
    content: String,
    leave_id: Option<u64>,
    is_read: bool,
    link: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> StoreResult<Self> {
        Ok(Notification {
            id: row.id,
            recipient: row.recipient_id,
            kind: parse_column("notifications.kind", &row.kind)?,
            content: row.content,
            leave_id: row.leave_id,
            read: row.is_read,
            link: row.link,
            created_at: row.created_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/* =========================
Users
========================= */
#[async_trait]
impl UserStore for MySqlStore {
    async fn insert(&self, new: NewUser) -> StoreResult<User> {
        let created_at = Utc::now();
        let email = new.email.to_lowercase();

        let result = sqlx::query(
            r#"
            INSERT INTO users
                (full_name, email, password_hash, role, manager_id, department, position, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.full_name)
        .bind(&email)
        .bind(&new.password_hash)
        .bind(new.role.as_ref())
        .bind(new.manager)
        .bind(&new.department)
        .bind(&new.position)
        .bind(UserStatus::Active.as_ref())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_duplicate(&e) {
                StoreError::Duplicate("User".to_string())
            } else {
                e.into()
            }
        })?;

        Ok(User {
            id: result.last_insert_id(),
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
            created_at,
        })
    }

    async fn get(&self, id: u64) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<(User, String)>> {
        let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?");
        let row = sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some((User::try_from(r.user)?, r.password_hash))),
            None => Ok(None),
        }
    }

    async fn password_hash(&self, id: u64) -> StoreResult<Option<String>> {
        Ok(
            sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn direct_reports(&self, manager_id: u64) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE manager_id = ? ORDER BY full_name");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(manager_id)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn set_status(&self, id: u64, status: UserStatus) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status.as_ref())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_password(&self, id: u64, password_hash: String) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_profile(&self, id: u64, patch: ProfileUpdate) -> StoreResult<Option<User>> {
        sqlx::query(
            r#"
            UPDATE users
            SET full_name = COALESCE(?, full_name),
                phone     = COALESCE(?, phone),
                address   = COALESCE(?, address),
                bio       = COALESCE(?, bio)
            WHERE id = ?
            "#,
        )
        .bind(patch.full_name)
        .bind(patch.phone)
        .bind(patch.address)
        .bind(patch.bio)
        .bind(id)
        .execute(&self.pool)
        .await?;

        UserStore::get(self, id).await
    }

    async fn update(&self, id: u64, patch: UserUpdate) -> StoreResult<Option<User>> {
        sqlx::query(
            r#"
            UPDATE users
            SET full_name  = COALESCE(?, full_name),
                email      = COALESCE(?, email),
                role       = COALESCE(?, role),
                department = COALESCE(?, department),
                position   = COALESCE(?, position),
                manager_id = COALESCE(?, manager_id),
                status     = COALESCE(?, status)
            WHERE id = ?
            "#,
        )
        .bind(patch.full_name)
        .bind(patch.email.map(|e| e.to_lowercase()))
        .bind(patch.role.map(|r| r.as_ref().to_string()))
        .bind(patch.department)
        .bind(patch.position)
        .bind(patch.manager)
        .bind(patch.status.map(|s| s.as_ref().to_string()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_duplicate(&e) {
                StoreError::Duplicate("User".to_string())
            } else {
                e.into()
            }
        })?;

        UserStore::get(self, id).await
    }

    async fn delete(&self, id: u64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE recipient_id = ?
               OR leave_id IN (SELECT id FROM leave_requests WHERE requester_id = ?)
            "#,
        )
        .bind(id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM leave_requests WHERE requester_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let removed = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(removed > 0)
    }
}

/* =========================
Leave requests
========================= */
#[async_trait]
impl LeaveStore for MySqlStore {
    async fn insert(&self, requester: u64, new: NewLeave) -> StoreResult<LeaveRequest> {
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (requester_id, leave_type, start_date, end_date, days, reason, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(requester)
        .bind(new.leave_type.as_ref())
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.days)
        .bind(&new.reason)
        .bind(LeaveStatus::Pending.as_ref())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(LeaveRequest {
            id: result.last_insert_id(),
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
            created_at,
        })
    }

    async fn get(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?");
        sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(LeaveRequest::try_from)
            .transpose()
    }

    async fn list(&self, filter: &LeaveFilter) -> StoreResult<Vec<LeaveRequest>> {
        let mut where_sql = String::from(" WHERE 1=1");

        if let Some(ids) = &filter.requesters {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; ids.len()].join(", ");
            where_sql.push_str(&format!(" AND requester_id IN ({placeholders})"));
        }
        if filter.status.is_some() {
            where_sql.push_str(" AND status = ?");
        }

        let sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests{where_sql} ORDER BY created_at DESC, id DESC"
        );

        let mut query = sqlx::query_as::<_, LeaveRow>(&sql);
        for id in filter.requesters.iter().flatten() {
            query = query.bind(*id);
        }
        if let Some(status) = &filter.status {
            query = query.bind(status.as_ref());
        }

        let rows = query.fetch_all(&self.pool).await?;
        convert_all(rows)
    }

    async fn decide_if_pending(
        &self,
        id: u64,
        decision: &DecisionRecord,
    ) -> StoreResult<Option<LeaveRequest>> {
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, decided_by = ?, decided_on = ?, comments = ?, rejection_reason = ?
            WHERE id = ?
            AND status = 'Pending'
            "#,
        )
        .bind(decision.status.as_ref())
        .bind(decision.decided_by)
        .bind(decision.decided_on)
        .bind(&decision.comments)
        .bind(&decision.rejection_reason)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        LeaveStore::get(self, id).await
    }

    async fn delete_if_pending(&self, id: u64, requester: u64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM leave_requests
            WHERE id = ?
            AND requester_id = ?
            AND status = 'Pending'
            "#,
        )
        .bind(id)
        .bind(requester)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/* =========================
Notifications
========================= */
#[async_trait]
impl NotificationStore for MySqlStore {
    async fn insert(&self, new: NewNotification) -> StoreResult<Notification> {
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO notifications
                (recipient_id, kind, content, leave_id, is_read, link, created_at)
            VALUES (?, ?, ?, ?, FALSE, ?, ?)
            "#,
        )
        .bind(new.recipient)
        .bind(new.kind.as_ref())
        .bind(&new.content)
        .bind(new.leave_id)
        .bind(&new.link)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(Notification {
            id: result.last_insert_id(),
            recipient: new.recipient,
            kind: new.kind,
            content: new.content,
            leave_id: new.leave_id,
            read: false,
            link: new.link,
            created_at,
        })
    }

    async fn get(&self, id: u64) -> StoreResult<Option<Notification>> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?");
        sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Notification::try_from)
            .transpose()
    }

    async fn list_for(&self, recipient: u64) -> StoreResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE recipient_id = ? ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(recipient)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn mark_read(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        // already-read rows report zero changed rows on MySQL
        Ok(result.rows_affected() > 0 || NotificationStore::get(self, id).await?.is_some())
    }

    async fn mark_all_read(&self, recipient: u64) -> StoreResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = TRUE WHERE recipient_id = ? AND is_read = FALSE")
                .bind(recipient)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
