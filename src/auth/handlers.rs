use crate::{
    api::user::MIN_PASSWORD_LEN,
    auth::{
        auth::AuthUser,
        jwt::generate_access_token,
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, FieldError},
    model::user::{NewUser, User},
    models::{LoginReqDto, LoginResponse, RegisterReq},
    store::Stores,
};
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

// auth end points

fn issue_token(user: &User, config: &Config) -> Result<String, AppError> {
    generate_access_token(
        user.id,
        user.email.clone(),
        user.role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to sign access token");
        AppError::Unexpected("Server error".into())
    })
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl RegisterReq {
    /// Returns `(full_name, email, password)` once every required field is usable.
    fn validate(&self) -> Result<(String, String, &str), AppError> {
        let mut errors = Vec::new();

        let full_name = trimmed(&self.full_name);
        if full_name.is_none() {
            errors.push(FieldError::new("fullName", "Full name is required"));
        }

        let email = trimmed(&self.email)
            .map(|e| e.to_lowercase())
            .filter(|e| matches!(e.split_once('@'), Some((local, domain)) if !local.is_empty() && domain.contains('.')));
        if email.is_none() {
            errors.push(FieldError::new("email", "Please include a valid email"));
        }

        let password = self
            .password
            .as_deref()
            .filter(|p| p.chars().count() >= MIN_PASSWORD_LEN);
        if password.is_none() {
            errors.push(FieldError::new(
                "password",
                "Please enter a password with 6 or more characters",
            ));
        }

        match (full_name, email, password) {
            (Some(n), Some(e), Some(p)) => Ok((n, e, p)),
            _ => Err(AppError::Validation(errors)),
        }
    }
}

/// Registers a user and signs them in.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = LoginResponse),
        (status = 400, description = "Validation failed or manager not found"),
        (status = 409, description = "Email already registered", body = Object, example = json!({
            "msg": "User already exists"
        }))
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip_all, fields(email = ?req.email))]
pub async fn register(
    req: web::Json<RegisterReq>,
    stores: web::Data<Stores>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let (full_name, email, password) = req.validate()?;

    if let Some(manager) = req.manager {
        debug!(manager, "Checking manager exists");
        if stores.users.get(manager).await.map_err(AppError::from)?.is_none() {
            return Err(AppError::BadRequest("Manager not found".into()).into());
        }
    }

    let password_hash = hash_password(password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        AppError::Unexpected("Server error".into())
    })?;

    let user = stores
        .users
        .insert(NewUser {
            full_name,
            email,
            password_hash,
            role: req.role.unwrap_or_default(),
            manager: req.manager,
            department: trimmed(&req.department),
            position: trimmed(&req.position),
        })
        .await
        .map_err(AppError::from)?;

    info!(user_id = user.id, role = %user.role, "User registered");
    if user.role.is_manager_or_admin() {
        // registration is unauthenticated, so this is worth auditing
        warn!(user_id = user.id, email = %user.email, role = %user.role, "Self-registered with elevated role");
    }

    let token = issue_token(&user, &config)?;
    Ok(HttpResponse::Created().json(LoginResponse { token, user }))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = Object, example = json!({
            "msg": "Invalid credentials"
        }))
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip_all, fields(email = %user.email))]
pub async fn login(
    user: web::Json<LoginReqDto>,
    stores: web::Data<Stores>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    info!("Login request received");

    // 1️⃣ Basic validation
    if user.email.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty email or password");
        return Err(AppError::Unauthorized("Invalid credentials".into()).into());
    }

    // 2️⃣ Fetch user
    let Some((db_user, stored_hash)) = stores
        .users
        .find_credentials(user.email.trim())
        .await
        .map_err(AppError::from)?
    else {
        info!("Invalid credentials: user not found");
        return Err(AppError::Unauthorized("Invalid credentials".into()).into());
    };
    debug!(user_id = db_user.id, "User found");

    // 3️⃣ Verify password
    if let Err(e) = verify_password(&user.password, &stored_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()).into());
    }

    // 4️⃣ Generate access token
    let token = issue_token(&db_user, &config)?;

    info!(user_id = db_user.id, "Login successful");
    Ok(HttpResponse::Ok().json(LoginResponse {
        token,
        user: db_user,
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "The signed-in user", body = User),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, stores: web::Data<Stores>) -> actix_web::Result<impl Responder> {
    let user = stores
        .users
        .get(auth.user_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(HttpResponse::Ok().json(user))
}
