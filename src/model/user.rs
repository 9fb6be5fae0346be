use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::model::role::Role;

/// Availability of a user. `OnLeave` is advisory and only ever set as a side
/// effect of approving a leave that has already started.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum UserStatus {
    Active,
    OnLeave,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 7,
    "fullName": "Jane Doe",
    "email": "jane@company.com",
    "role": "employee",
    "manager": 2,
    "department": "Engineering",
    "position": "Developer",
    "status": "active",
    "phone": null,
    "address": null,
    "bio": null,
    "createdAt": "2026-01-01T00:00:00Z"
}))]
pub struct User {
    pub id: u64,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    /// Direct manager, if any.
    pub manager: Option<u64>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub status: UserStatus,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn reports_to(&self, manager_id: u64) -> bool {
        self.manager == Some(manager_id)
    }
}

/// Insert payload for the user store. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub manager: Option<u64>,
    pub department: Option<String>,
    pub position: Option<String>,
}

/// Self-service profile fields. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
}

/// Administrative update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub manager: Option<u64>,
    pub status: Option<UserStatus>,
}

impl ProfileUpdate {
    pub fn apply(self, user: &mut User) {
        if let Some(v) = self.full_name {
            user.full_name = v;
        }
        if let Some(v) = self.phone {
            user.phone = Some(v);
        }
        if let Some(v) = self.address {
            user.address = Some(v);
        }
        if let Some(v) = self.bio {
            user.bio = Some(v);
        }
    }
}

impl UserUpdate {
    pub fn apply(self, user: &mut User) {
        if let Some(v) = self.full_name {
            user.full_name = v;
        }
        if let Some(v) = self.email {
            user.email = v;
        }
        if let Some(v) = self.role {
            user.role = v;
        }
        if let Some(v) = self.department {
            user.department = Some(v);
        }
        if let Some(v) = self.position {
            user.position = Some(v);
        }
        if let Some(v) = self.manager {
            user.manager = Some(v);
        }
        if let Some(v) = self.status {
            user.status = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_uses_kebab_case() {
        assert_eq!(UserStatus::OnLeave.as_ref(), "on-leave");
        assert_eq!(UserStatus::from_str("on-leave").unwrap(), UserStatus::OnLeave);
        assert_eq!(
            serde_json::to_value(UserStatus::OnLeave).unwrap(),
            serde_json::json!("on-leave")
        );
    }
}
