use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::store::{Stores, UserStore};

fn reject(req: ServiceRequest, msg: &str) -> ServiceResponse<BoxBody> {
    tracing::debug!(path = %req.path(), reason = msg, "Rejected unauthenticated request");
    let resp = AppError::Unauthorized(msg.to_string()).error_response();
    req.into_response(resp)
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let jwt_secret = match req.app_data::<Data<Config>>() {
        Some(c) => c.jwt_secret.clone(),
        None => return Err(AppError::Unexpected("App config missing".into()).into()),
    };
    let users = match req.app_data::<Data<Stores>>() {
        Some(s) => s.users.clone(),
        None => return Err(AppError::Unexpected("App stores missing".into()).into()),
    };

    let token = match req.headers().get("Authorization") {
        None => Err("No token, authorization denied"),
        Some(h) => match h.to_str() {
            Err(_) => Err("Invalid Authorization header encoding"),
            Ok(v) => v
                .strip_prefix("Bearer ")
                .map(str::to_string)
                .ok_or("Authorization header must start with Bearer"),
        },
    };

    let token = match token {
        Ok(t) => t,
        Err(msg) => return Ok(reject(req, msg)),
    };

    let claims = match verify_token(&token, &jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Token verification failed");
            return Ok(reject(req, "Token is not valid"));
        }
    };

    // role and email come from the store; the token may predate a demotion
    let user = match users.get(claims.user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            tracing::debug!(user_id = claims.user_id, "Token subject no longer exists");
            return Ok(reject(req, "Token is not valid"));
        }
        Err(e) => return Err(AppError::from(e).into()),
    };
    if user.role != claims.role {
        tracing::debug!(
            user_id = user.id,
            token_role = %claims.role,
            role = %user.role,
            "Role changed since token was issued"
        );
    }

    let auth_user = AuthUser {
        user_id: user.id,
        email: user.email,
        role: user.role,
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}
