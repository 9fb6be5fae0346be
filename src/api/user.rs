use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    auth::{
        auth::AuthUser,
        password::{hash_password, verify_password},
        policy,
    },
    error::{AppError, FieldError},
    model::{
        role::Role,
        user::{ProfileUpdate, User, UserStatus, UserUpdate},
    },
    store::Stores,
};

const USER_NOT_FOUND: &str = "User not found";
pub const MIN_PASSWORD_LEN: usize = 6;

/// Blank strings count as "not supplied".
fn provided(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    #[schema(example = "Jane Doe")]
    pub full_name: Option<String>,
    #[schema(example = "+1 555 0100")]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
}

impl From<&UpdateProfile> for ProfileUpdate {
    fn from(req: &UpdateProfile) -> Self {
        ProfileUpdate {
            full_name: provided(&req.full_name),
            phone: provided(&req.phone),
            address: provided(&req.address),
            bio: provided(&req.bio),
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub department: Option<String>,
    pub position: Option<String>,
    /// Id of the new direct manager
    pub manager: Option<u64>,
    pub status: Option<UserStatus>,
}

impl From<&UpdateUser> for UserUpdate {
    fn from(req: &UpdateUser) -> Self {
        UserUpdate {
            full_name: provided(&req.full_name),
            email: provided(&req.email),
            role: req.role,
            department: provided(&req.department),
            position: provided(&req.position),
            manager: req.manager,
            status: req.status,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn list_users(
    auth: AuthUser,
    stores: web::Data<Stores>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let users = stores.users.list().await.map_err(AppError::from)?;
    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    get,
    path = "/api/users/team",
    responses(
        (status = 200, description = "Direct reports of the caller, ordered by name", body = [User]),
        (status = 403, description = "Manager role required")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn team_members(
    auth: AuthUser,
    stores: web::Data<Stores>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let team = stores
        .users
        .direct_reports(auth.user_id)
        .await
        .map_err(AppError::from)?;
    Ok(HttpResponse::Ok().json(team))
}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "ID of the user")),
    responses(
        (status = 200, description = "User found", body = User),
        (status = 403, description = "Not authorized to view this user"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn get_user(
    auth: AuthUser,
    stores: web::Data<Stores>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let user = stores
        .users
        .get(path.into_inner())
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))?;

    if !policy::can_view_user(&auth.actor(), &user) {
        return Err(AppError::forbidden("Not authorized to view this user").into());
    }
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    put,
    path = "/api/users/profile",
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn update_profile(
    auth: AuthUser,
    stores: web::Data<Stores>,
    payload: web::Json<UpdateProfile>,
) -> actix_web::Result<impl Responder> {
    let user = stores
        .users
        .update_profile(auth.user_id, ProfileUpdate::from(&*payload))
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))?;
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    put,
    path = "/api/users/change-password",
    request_body = ChangePassword,
    responses(
        (status = 200, description = "Password updated", body = Object, example = json!({
            "msg": "Password updated successfully"
        })),
        (status = 400, description = "Invalid input or wrong current password")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn change_password(
    auth: AuthUser,
    stores: web::Data<Stores>,
    payload: web::Json<ChangePassword>,
) -> actix_web::Result<impl Responder> {
    let mut errors = Vec::new();
    let current = payload.current_password.as_deref().filter(|p| !p.is_empty());
    if current.is_none() {
        errors.push(FieldError::new("currentPassword", "Current password is required"));
    }
    let new = payload
        .new_password
        .as_deref()
        .filter(|p| p.chars().count() >= MIN_PASSWORD_LEN);
    if new.is_none() {
        errors.push(FieldError::new(
            "newPassword",
            "New password must be at least 6 characters",
        ));
    }
    let (Some(current), Some(new)) = (current, new) else {
        return Err(AppError::Validation(errors).into());
    };

    let stored = stores
        .users
        .password_hash(auth.user_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))?;

    if verify_password(current, &stored).is_err() {
        return Err(AppError::BadRequest("Current password is incorrect".into()).into());
    }

    let hashed = hash_password(new).map_err(|e| {
        tracing::error!(error = %e, "Password hashing failed");
        AppError::Unexpected("Server error".into())
    })?;
    stores
        .users
        .set_password(auth.user_id, hashed)
        .await
        .map_err(AppError::from)?;

    info!(user_id = auth.user_id, "Password changed");
    Ok(HttpResponse::Ok().json(json!({ "msg": "Password updated successfully" })))
}

#[utoipa::path(
    put,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "ID of the user to update")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid manager assignment"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn update_user(
    auth: AuthUser,
    stores: web::Data<Stores>,
    path: web::Path<u64>,
    payload: web::Json<UpdateUser>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let id = path.into_inner();

    if let Some(manager) = payload.manager {
        if manager == id {
            return Err(AppError::BadRequest("User cannot be their own manager".into()).into());
        }
        let exists = stores.users.get(manager).await.map_err(AppError::from)?;
        if exists.is_none() {
            return Err(AppError::BadRequest("Manager not found".into()).into());
        }
    }

    let user: User = stores
        .users
        .update(id, UserUpdate::from(&*payload))
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))?;

    info!(user_id = id, by = auth.user_id, "User updated");
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "ID of the user to remove")),
    responses(
        (status = 200, description = "User removed with their leave requests and notifications"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn delete_user(
    auth: AuthUser,
    stores: web::Data<Stores>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let id = path.into_inner();

    if !stores.users.delete(id).await.map_err(AppError::from)? {
        return Err(AppError::not_found(USER_NOT_FOUND).into());
    }

    info!(user_id = id, by = auth.user_id, "User removed");
    Ok(HttpResponse::Ok().json(json!({ "msg": "User removed" })))
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{PASSWORD, TestApp};
    use actix_web::{http::StatusCode, test};
    use serde_json::{Value, json};

    #[actix_web::test]
    async fn list_is_admin_only() {
        let ctx = TestApp::seeded().await;
        let app = test::init_service(ctx.app()).await;

        let resp = test::call_service(&app, ctx.get("/api/users", &ctx.manager).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = test::call_service(&app, ctx.get("/api/users", &ctx.admin).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body.as_array().map(Vec::len), Some(4));
    }

    #[actix_web::test]
    async fn team_lists_direct_reports() {
        let ctx = TestApp::seeded().await;
        let app = test::init_service(ctx.app()).await;

        let resp = test::call_service(&app, ctx.get("/api/users/team", &ctx.manager).to_request()).await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!([serde_json::to_value(&ctx.employee).unwrap()]));

        let resp = test::call_service(&app, ctx.get("/api/users/team", &ctx.employee).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn viewing_users_follows_reporting_line() {
        let ctx = TestApp::seeded().await;
        let app = test::init_service(ctx.app()).await;
        let uri = format!("/api/users/{}", ctx.employee.id);

        for (viewer, expected) in [
            (&ctx.employee, StatusCode::OK),
            (&ctx.manager, StatusCode::OK),
            (&ctx.admin, StatusCode::OK),
            (&ctx.other_manager, StatusCode::FORBIDDEN),
        ] {
            let resp = test::call_service(&app, ctx.get(&uri, viewer).to_request()).await;
            assert_eq!(resp.status(), expected, "viewer {}", viewer.full_name);
        }

        let resp = test::call_service(&app, ctx.get("/api/users/9999", &ctx.admin).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn profile_ignores_blank_fields() {
        let ctx = TestApp::seeded().await;
        let app = test::init_service(ctx.app()).await;

        let resp = test::call_service(
            &app,
            ctx.put("/api/users/profile", &ctx.employee)
                .set_json(json!({ "fullName": "  ", "phone": "555-0100" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["fullName"], "Eli Employee");
        assert_eq!(body["phone"], "555-0100");
    }

    #[actix_web::test]
    async fn change_password_checks_current() {
        let ctx = TestApp::seeded().await;
        let app = test::init_service(ctx.app()).await;

        let resp = test::call_service(
            &app,
            ctx.put("/api/users/change-password", &ctx.employee)
                .set_json(json!({ "currentPassword": PASSWORD, "newPassword": "abc" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["errors"][0]["field"], "newPassword");

        let resp = test::call_service(
            &app,
            ctx.put("/api/users/change-password", &ctx.employee)
                .set_json(json!({ "currentPassword": "wrong-one", "newPassword": "brand-new" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["msg"], "Current password is incorrect");

        let resp = test::call_service(
            &app,
            ctx.put("/api/users/change-password", &ctx.employee)
                .set_json(json!({ "currentPassword": PASSWORD, "newPassword": "brand-new" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(
            &app,
            ctx.anonymous(actix_web::http::Method::POST, "/api/auth/login")
                .set_json(json!({ "email": "eli@corp.test", "password": "brand-new" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn admin_reassigns_manager() {
        let ctx = TestApp::seeded().await;
        let app = test::init_service(ctx.app()).await;
        let uri = format!("/api/users/{}", ctx.employee.id);

        let resp = test::call_service(
            &app,
            ctx.put(&uri, &ctx.admin)
                .set_json(json!({ "manager": ctx.employee.id }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(
            &app,
            ctx.put(&uri, &ctx.admin)
                .set_json(json!({ "manager": 9999 }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["msg"], "Manager not found");

        let resp = test::call_service(
            &app,
            ctx.put(&uri, &ctx.admin)
                .set_json(json!({ "manager": ctx.other_manager.id, "department": "Ops" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["manager"], ctx.other_manager.id);
        assert_eq!(body["department"], "Ops");

        let resp = test::call_service(
            &app,
            ctx.put(&uri, &ctx.manager)
                .set_json(json!({ "department": "Sales" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn delete_cascades_to_leaves() {
        let ctx = TestApp::seeded().await;
        let app = test::init_service(ctx.app()).await;
        let leave_id = ctx
            .submit(
                &ctx.employee,
                json!({
                    "type": "Personal Leave",
                    "startDate": "2030-01-02",
                    "endDate": "2030-01-02",
                    "days": 1,
                    "reason": "errand"
                }),
            )
            .await;

        let uri = format!("/api/users/{}", ctx.employee.id);
        let resp = test::call_service(&app, ctx.delete(&uri, &ctx.admin).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(
            &app,
            ctx.get(&format!("/api/leaves/{leave_id}"), &ctx.admin).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(&app, ctx.delete(&uri, &ctx.admin).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
