use actix_web::{HttpResponse, Responder, web};
use serde_json::json;

use crate::{auth::auth::AuthUser, error::AppError, model::notification::Notification, store::Stores};

const NOTIFICATION_NOT_FOUND: &str = "Notification not found";

#[utoipa::path(
    get,
    path = "/api/notifications",
    responses(
        (status = 200, description = "The caller's notifications, newest first", body = [Notification]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn list_notifications(
    auth: AuthUser,
    stores: web::Data<Stores>,
) -> actix_web::Result<impl Responder> {
    let inbox = stores
        .notifications
        .list_for(auth.user_id)
        .await
        .map_err(AppError::from)?;
    Ok(HttpResponse::Ok().json(inbox))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{notification_id}/read",
    params(("notification_id" = u64, Path, description = "ID of the notification")),
    responses(
        (status = 200, description = "Marked as read", body = Object, example = json!({
            "msg": "Notification marked as read"
        })),
        (status = 403, description = "Not the recipient"),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn mark_read(
    auth: AuthUser,
    stores: web::Data<Stores>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let notification = stores
        .notifications
        .get(id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found(NOTIFICATION_NOT_FOUND))?;

    if notification.recipient != auth.user_id {
        return Err(AppError::forbidden("Not authorized to update this notification").into());
    }

    stores.notifications.mark_read(id).await.map_err(AppError::from)?;
    Ok(HttpResponse::Ok().json(json!({ "msg": "Notification marked as read" })))
}

#[utoipa::path(
    put,
    path = "/api/notifications/read-all",
    responses(
        (status = 200, description = "Every unread notification of the caller marked as read", body = Object, example = json!({
            "msg": "All notifications marked as read",
            "updated": 3
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn mark_all_read(
    auth: AuthUser,
    stores: web::Data<Stores>,
) -> actix_web::Result<impl Responder> {
    let updated = stores
        .notifications
        .mark_all_read(auth.user_id)
        .await
        .map_err(AppError::from)?;
    Ok(HttpResponse::Ok().json(json!({
        "msg": "All notifications marked as read",
        "updated": updated
    })))
}
