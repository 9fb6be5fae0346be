use crate::api::leave_request::{CreateLeave, UpdateStatus};
use crate::api::user::{ChangePassword, UpdateProfile, UpdateUser};
use crate::error::FieldError;
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::notification::{Notification, NotificationKind};
use crate::model::role::Role;
use crate::model::user::{User, UserStatus};
use crate::models::{LoginReqDto, LoginResponse, RegisterReq};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Desk API",
        version = "1.0.0",
        description = r#"
## Leave request management

Employees submit leave requests, their direct manager (or an admin) approves or
rejects them, and everyone involved is notified.

### 🔹 Key Features
- **Leave lifecycle**
  - Submit, cancel while pending, approve or reject exactly once
- **Team views**
  - Managers see their direct reports' requests and pending queue
- **Users**
  - Profiles, password changes, admin management of reporting lines
- **Notifications**
  - In-app inbox for submissions and decisions

### 🔐 Security
Every endpoint except register and login needs a **JWT Bearer** token.
Roles are `employee`, `manager` and `admin`.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::me,

        crate::api::leave_request::all_leaves,
        crate::api::leave_request::team_leaves,
        crate::api::leave_request::pending_leaves,
        crate::api::leave_request::my_leaves,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::update_leave_status,
        crate::api::leave_request::cancel_leave,

        crate::api::user::list_users,
        crate::api::user::team_members,
        crate::api::user::get_user,
        crate::api::user::update_profile,
        crate::api::user::change_password,
        crate::api::user::update_user,
        crate::api::user::delete_user,

        crate::api::notification::list_notifications,
        crate::api::notification::mark_read,
        crate::api::notification::mark_all_read
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            LoginResponse,
            User,
            UserStatus,
            Role,
            LeaveRequest,
            LeaveType,
            LeaveStatus,
            CreateLeave,
            UpdateStatus,
            UpdateProfile,
            ChangePassword,
            UpdateUser,
            Notification,
            NotificationKind,
            FieldError
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Registration and sign-in"),
        (name = "Leave", description = "Leave request lifecycle APIs"),
        (name = "User", description = "User and team management APIs"),
        (name = "Notification", description = "In-app notification APIs"),
    )
)]
pub struct ApiDoc;
