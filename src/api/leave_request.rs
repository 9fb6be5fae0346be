use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, FieldError},
    model::leave_request::{Decision, LeaveRequest, LeaveType, NewLeave},
    service::{LeaveScope, LeaveService},
};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeave {
    #[serde(rename = "type")]
    #[schema(example = "Sick Leave")]
    pub leave_type: Option<String>,
    #[schema(example = "2026-06-01", format = "date")]
    pub start_date: Option<String>,
    #[schema(example = "2026-06-01", format = "date")]
    pub end_date: Option<String>,
    /// Whole days requested; a number or a numeric string
    #[schema(example = 1, value_type = u32)]
    pub days: Option<Value>,
    #[schema(example = "flu")]
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateStatus {
    /// `Approved` or `Rejected`
    #[schema(example = "Approved")]
    pub status: Option<String>,
    #[schema(example = "Enjoy your time off")]
    pub comments: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
}

fn parse_days(raw: &Value) -> Option<u32> {
    let days = match raw {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(days).ok().filter(|d| *d > 0)
}

impl CreateLeave {
    pub fn validate(&self) -> Result<NewLeave, AppError> {
        let mut errors = Vec::new();

        let leave_type = match non_empty(&self.leave_type) {
            None => {
                errors.push(FieldError::new("type", "Leave type is required"));
                None
            }
            Some(raw) => match raw.parse::<LeaveType>() {
                Ok(t) => Some(t),
                Err(_) => {
                    errors.push(FieldError::new(
                        "type",
                        "Leave type must be one of: Annual Leave, Sick Leave, Personal Leave, Bereavement, Other",
                    ));
                    None
                }
            },
        };

        let mut date = |field: &str, value: &Option<String>, label: &str| match non_empty(value) {
            None => {
                errors.push(FieldError::new(field, &format!("{label} is required")));
                None
            }
            Some(raw) => {
                let parsed = parse_date(raw);
                if parsed.is_none() {
                    errors.push(FieldError::new(field, &format!("{label} must be a valid date")));
                }
                parsed
            }
        };
        let start_date = date("startDate", &self.start_date, "Start date");
        let end_date = date("endDate", &self.end_date, "End date");

        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                errors.push(FieldError::new("endDate", "End date cannot be before start date"));
            }
        }

        let days = match &self.days {
            None | Some(Value::Null) => {
                errors.push(FieldError::new("days", "Number of days is required"));
                None
            }
            Some(raw) => {
                let parsed = parse_days(raw);
                if parsed.is_none() {
                    errors.push(FieldError::new("days", "Number of days must be a positive whole number"));
                }
                parsed
            }
        };

        let reason = non_empty(&self.reason);
        if reason.is_none() {
            errors.push(FieldError::new("reason", "Reason is required"));
        }

        match (leave_type, start_date, end_date, days, reason) {
            (Some(leave_type), Some(start_date), Some(end_date), Some(days), Some(reason))
                if errors.is_empty() =>
            {
                Ok(NewLeave {
                    leave_type,
                    start_date,
                    end_date,
                    days,
                    reason: reason.to_string(),
                })
            }
            _ => Err(AppError::Validation(errors)),
        }
    }
}

impl UpdateStatus {
    pub fn validate(&self) -> Result<(Decision, String), AppError> {
        let mut errors = Vec::new();

        let decision = non_empty(&self.status).and_then(|s| s.parse::<Decision>().ok());
        if decision.is_none() {
            errors.push(FieldError::new("status", "Status must be Approved or Rejected"));
        }

        let comments = non_empty(&self.comments);
        if comments.is_none() {
            errors.push(FieldError::new("comments", "Comments are required"));
        }

        match (decision, comments) {
            (Some(d), Some(c)) => Ok((d, c.to_string())),
            _ => Err(AppError::Validation(errors)),
        }
    }
}

/* =========================
List all leaves (admin)
========================= */
#[utoipa::path(
    get,
    path = "/api/leaves/all",
    responses(
        (status = 200, description = "Every leave request, newest first", body = [LeaveRequest]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn all_leaves(
    auth: AuthUser,
    service: web::Data<LeaveService>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let leaves = service.list_for(&auth.actor(), LeaveScope::All).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

/* =========================
Team leaves (manager/admin)
========================= */
#[utoipa::path(
    get,
    path = "/api/leaves/team",
    responses(
        (status = 200, description = "Leave requests of the caller's direct reports", body = [LeaveRequest]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager role required")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn team_leaves(
    auth: AuthUser,
    service: web::Data<LeaveService>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let leaves = service.list_for(&auth.actor(), LeaveScope::Team).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

#[utoipa::path(
    get,
    path = "/api/leaves/pending",
    responses(
        (status = 200, description = "Pending leave requests of the caller's direct reports", body = [LeaveRequest]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager role required")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn pending_leaves(
    auth: AuthUser,
    service: web::Data<LeaveService>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let leaves = service.list_for(&auth.actor(), LeaveScope::PendingTeam).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

#[utoipa::path(
    get,
    path = "/api/leaves/me",
    responses(
        (status = 200, description = "The caller's own leave requests; empty when none", body = [LeaveRequest]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn my_leaves(
    auth: AuthUser,
    service: web::Data<LeaveService>,
) -> actix_web::Result<impl Responder> {
    let leaves = service.list_for(&auth.actor(), LeaveScope::Mine).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leaves/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not authorized to view this leave request"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "msg": "Leave request not found"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = service.get_by_id(&auth.actor(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leaves",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "errors": [{ "field": "reason", "msg": "Reason is required" }]
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let new = payload.validate()?;
    let leave = service.create(&auth.actor(), new).await?;
    Ok(HttpResponse::Created().json(leave))
}

/* =========================
Approve / reject (manager/admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leaves/{leave_id}/status",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to decide")
    ),
    request_body = UpdateStatus,
    responses(
        (status = 200, description = "Leave request decided", body = LeaveRequest),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the requester's manager or an admin"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request has already been decided", body = Object, example = json!({
            "msg": "Leave request has already been decided"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_leave_status(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    path: web::Path<u64>,
    payload: web::Json<UpdateStatus>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let (decision, comments) = payload.validate()?;

    let leave = service
        .transition_status(&auth.actor(), path.into_inner(), decision, &comments)
        .await?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Cancel (owner, pending only)
========================= */
#[utoipa::path(
    delete,
    path = "/api/leaves/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to cancel")
    ),
    responses(
        (status = 200, description = "Leave request cancelled", body = Object, example = json!({
            "msg": "Leave request cancelled"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner of this leave request"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Only pending leave requests can be cancelled")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    service.cancel(&auth.actor(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "msg": "Leave request cancelled" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::TestApp;
    use crate::model::{role::Role, user::UserUpdate};
    use actix_web::{http::StatusCode, test as actix_test};
    use serde_json::json;

    fn create_body(raw: Value) -> CreateLeave {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn create_validation_collects_every_field() {
        let err = create_body(json!({})).validate().unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["type", "startDate", "endDate", "days", "reason"]);
    }

    #[test]
    fn create_validation_accepts_numeric_strings_and_timestamps() {
        let new = create_body(json!({
            "type": "Annual Leave",
            "startDate": "2026-07-01T00:00:00Z",
            "endDate": "2026-07-03",
            "days": "3",
            "reason": " beach "
        }))
        .validate()
        .unwrap();
        assert_eq!(new.leave_type, LeaveType::Annual);
        assert_eq!(new.days, 3);
        assert_eq!(new.reason, "beach");
        assert_eq!(new.start_date, NaiveDate::from_ymd_opt(2026, 7, 1).unwrap());
    }

    #[test]
    fn create_validation_rejects_reversed_dates_and_bad_days() {
        let err = create_body(json!({
            "type": "Other",
            "startDate": "2026-07-05",
            "endDate": "2026-07-01",
            "days": 0,
            "reason": "x"
        }))
        .validate()
        .unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["endDate", "days"]);

        assert!(parse_days(&json!(2.5)).is_none());
        assert!(parse_days(&json!(-1)).is_none());
        assert!(parse_days(&json!("abc")).is_none());
        assert_eq!(parse_days(&json!(4.0)), Some(4));
    }

    #[test]
    fn status_validation() {
        let ok = UpdateStatus {
            status: Some("Rejected".into()),
            comments: Some("no cover".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(ok, (Decision::Rejected, "no cover".to_string()));

        let pending = UpdateStatus {
            status: Some("Pending".into()),
            comments: None,
        }
        .validate()
        .unwrap_err();
        let AppError::Validation(errors) = pending else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 2);
    }

    fn sick_day() -> Value {
        json!({
            "type": "Sick Leave",
            "startDate": "2025-06-01",
            "endDate": "2025-06-01",
            "days": 1,
            "reason": "flu"
        })
    }

    #[actix_web::test]
    async fn create_notifies_manager() {
        let ctx = TestApp::seeded().await;
        let app = actix_test::init_service(ctx.app()).await;

        let resp = actix_test::call_service(
            &app,
            ctx.post("/api/leaves", &ctx.employee).set_json(sick_day()).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = actix_test::read_body_json(resp).await;
        assert_eq!(created["status"], "Pending");
        assert_eq!(created["type"], "Sick Leave");
        assert!(created["decidedBy"].is_null());

        let resp = actix_test::call_service(&app, ctx.get("/api/notifications", &ctx.manager).to_request()).await;
        let inbox: Value = actix_test::read_body_json(resp).await;
        assert_eq!(inbox[0]["type"], "leave_request");
        assert_eq!(inbox[0]["leaveId"], created["id"]);
    }

    #[actix_web::test]
    async fn manager_approves_started_leave() {
        let ctx = TestApp::seeded().await;
        let app = actix_test::init_service(ctx.app()).await;
        let id = ctx.submit(&ctx.employee, sick_day()).await;

        let resp = actix_test::call_service(
            &app,
            ctx.put(&format!("/api/leaves/{id}/status"), &ctx.manager)
                .set_json(json!({ "status": "Approved", "comments": "ok" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let decided: Value = actix_test::read_body_json(resp).await;
        assert_eq!(decided["status"], "Approved");
        assert_eq!(decided["decidedBy"], ctx.manager.id);

        let resp = actix_test::call_service(&app, ctx.get("/api/auth/me", &ctx.employee).to_request()).await;
        let me: Value = actix_test::read_body_json(resp).await;
        assert_eq!(me["status"], "on-leave");

        let resp = actix_test::call_service(&app, ctx.get("/api/notifications", &ctx.employee).to_request()).await;
        let inbox: Value = actix_test::read_body_json(resp).await;
        assert_eq!(inbox[0]["type"], "leave_approved");
    }

    #[actix_web::test]
    async fn foreign_manager_forbidden() {
        let ctx = TestApp::seeded().await;
        let app = actix_test::init_service(ctx.app()).await;
        let id = ctx.submit(&ctx.employee, sick_day()).await;

        let resp = actix_test::call_service(
            &app,
            ctx.put(&format!("/api/leaves/{id}/status"), &ctx.other_manager)
                .set_json(json!({ "status": "Approved", "comments": "ok" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["msg"], "Not authorized to update this leave request");
    }

    #[actix_web::test]
    async fn cancel_decided_conflicts() {
        let ctx = TestApp::seeded().await;
        let app = actix_test::init_service(ctx.app()).await;
        let id = ctx.submit(&ctx.employee, sick_day()).await;

        let resp = actix_test::call_service(
            &app,
            ctx.put(&format!("/api/leaves/{id}/status"), &ctx.admin)
                .set_json(json!({ "status": "Approved", "comments": "fine" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = actix_test::call_service(
            &app,
            ctx.delete(&format!("/api/leaves/{id}"), &ctx.employee).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = actix_test::call_service(
            &app,
            ctx.put(&format!("/api/leaves/{id}/status"), &ctx.admin)
                .set_json(json!({ "status": "Rejected", "comments": "changed my mind" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn cancel_pending_then_gone() {
        let ctx = TestApp::seeded().await;
        let app = actix_test::init_service(ctx.app()).await;
        let id = ctx.submit(&ctx.employee, sick_day()).await;

        let resp = actix_test::call_service(
            &app,
            ctx.delete(&format!("/api/leaves/{id}"), &ctx.manager).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = actix_test::call_service(
            &app,
            ctx.delete(&format!("/api/leaves/{id}"), &ctx.employee).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["msg"], "Leave request cancelled");

        let resp = actix_test::call_service(
            &app,
            ctx.get(&format!("/api/leaves/{id}"), &ctx.employee).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn role_gates_on_list_routes() {
        let ctx = TestApp::seeded().await;
        let app = actix_test::init_service(ctx.app()).await;

        for (uri, user, expected) in [
            ("/api/leaves/all", &ctx.manager, StatusCode::FORBIDDEN),
            ("/api/leaves/all", &ctx.admin, StatusCode::OK),
            ("/api/leaves/team", &ctx.employee, StatusCode::FORBIDDEN),
            ("/api/leaves/team", &ctx.manager, StatusCode::OK),
            ("/api/leaves/pending", &ctx.employee, StatusCode::FORBIDDEN),
            ("/api/leaves/pending", &ctx.admin, StatusCode::OK),
            ("/api/leaves/me", &ctx.employee, StatusCode::OK),
        ] {
            let resp = actix_test::call_service(&app, ctx.get(uri, user).to_request()).await;
            assert_eq!(resp.status(), expected, "{uri} as {}", user.full_name);
        }

        let resp = actix_test::call_service(&app, ctx.get("/api/leaves/me", &ctx.employee).to_request()).await;
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body, json!([]));
    }

    #[actix_web::test]
    async fn employee_cannot_decide_even_own_request() {
        let ctx = TestApp::seeded().await;
        let app = actix_test::init_service(ctx.app()).await;
        let id = ctx.submit(&ctx.employee, sick_day()).await;

        let resp = actix_test::call_service(
            &app,
            ctx.put(&format!("/api/leaves/{id}/status"), &ctx.employee)
                .set_json(json!({ "status": "Approved", "comments": "self" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn invalid_bodies_and_ids() {
        let ctx = TestApp::seeded().await;
        let app = actix_test::init_service(ctx.app()).await;

        let resp = actix_test::call_service(
            &app,
            ctx.post("/api/leaves", &ctx.employee)
                .set_json(json!({ "type": "Holiday", "days": "x" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert!(body["errors"].as_array().is_some_and(|e| e.len() == 5));

        let resp = actix_test::call_service(
            &app,
            ctx.get("/api/leaves/not-an-id", &ctx.employee).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["msg"], "Leave request not found");

        let resp = actix_test::call_service(
            &app,
            ctx.anonymous(actix_web::http::Method::GET, "/api/leaves/me")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn demotion_takes_effect_before_token_expiry() {
        let ctx = TestApp::seeded().await;
        let app = actix_test::init_service(ctx.app()).await;
        let id = ctx.submit(&ctx.employee, sick_day()).await;

        // requests built now carry a token that still says "admin"
        let stale_decide = ctx
            .put(&format!("/api/leaves/{id}/status"), &ctx.admin)
            .set_json(json!({ "status": "Approved", "comments": "ok" }));
        let stale_list = ctx.get("/api/leaves/all", &ctx.admin);

        ctx.stores
            .users
            .update(
                ctx.admin.id,
                UserUpdate {
                    role: Some(Role::Employee),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let resp = actix_test::call_service(&app, stale_decide.to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let resp = actix_test::call_service(&app, stale_list.to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let stored = ctx.stores.leaves.get(id).await.unwrap().unwrap();
        assert!(stored.is_pending());
    }

    #[actix_web::test]
    async fn token_of_removed_user_is_rejected() {
        let ctx = TestApp::seeded().await;
        let app = actix_test::init_service(ctx.app()).await;
        let stale = ctx.get("/api/leaves/me", &ctx.employee);

        assert!(ctx.stores.users.delete(ctx.employee.id).await.unwrap());

        let resp = actix_test::call_service(&app, stale.to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
