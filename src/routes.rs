use crate::{
    api::{leave_request, notification, user},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::{AppError, FieldError},
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::anyhow;
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-route limiters. Built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct RateLimits {
    login: Limiter,
    register: Limiter,
    protected: Limiter,
}

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> anyhow::Result<Limiter> {
    let per_ms = (60_000 / u64::from(requests_per_min.max(1))).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min} requests per minute"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

impl RateLimits {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            register: build_limiter(config.rate_register_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

/// Unparseable ids in a path can never name a record.
fn path_not_found(msg: &'static str) -> web::PathConfig {
    web::PathConfig::default().error_handler(move |_, _| AppError::not_found(msg).into())
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _| {
        AppError::Validation(vec![FieldError::new("body", &err.to_string())]).into()
    })
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limits: &RateLimits) {
    let prefix = config.api_prefix.trim_end_matches('/');

    cfg.app_data(json_config());

    // Public routes
    cfg.service(
        web::scope(&format!("{prefix}/auth"))
            .service(
                web::resource("/login")
                    .wrap(limits.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limits.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/me")
                    .wrap(from_fn(auth_middleware))
                    .wrap(limits.protected.clone())
                    .route(web::get().to(handlers::me)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limits.protected.clone()) // rate limiting
            .service(
                web::scope("/leaves")
                    .app_data(path_not_found("Leave request not found"))
                    // /leaves
                    .service(web::resource("").route(web::post().to(leave_request::create_leave)))
                    // fixed paths must come before /leaves/{id}
                    .service(web::resource("/all").route(web::get().to(leave_request::all_leaves)))
                    .service(web::resource("/team").route(web::get().to(leave_request::team_leaves)))
                    .service(
                        web::resource("/pending").route(web::get().to(leave_request::pending_leaves)),
                    )
                    .service(web::resource("/me").route(web::get().to(leave_request::my_leaves)))
                    // /leaves/{id}/status
                    .service(
                        web::resource("/{id}/status")
                            .route(web::put().to(leave_request::update_leave_status)),
                    )
                    // /leaves/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave_request::get_leave))
                            .route(web::delete().to(leave_request::cancel_leave)),
                    ),
            )
            .service(
                web::scope("/users")
                    .app_data(path_not_found("User not found"))
                    .service(web::resource("").route(web::get().to(user::list_users)))
                    .service(web::resource("/team").route(web::get().to(user::team_members)))
                    .service(web::resource("/profile").route(web::put().to(user::update_profile)))
                    .service(
                        web::resource("/change-password").route(web::put().to(user::change_password)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(user::get_user))
                            .route(web::put().to(user::update_user))
                            .route(web::delete().to(user::delete_user)),
                    ),
            )
            .service(
                web::scope("/notifications")
                    .app_data(path_not_found("Notification not found"))
                    .service(
                        web::resource("").route(web::get().to(notification::list_notifications)),
                    )
                    .service(
                        web::resource("/read-all").route(web::put().to(notification::mark_all_read)),
                    )
                    .service(
                        web::resource("/{id}/read").route(web::put().to(notification::mark_read)),
                    ),
            ),
    );
}

#[cfg(test)]
pub mod testing {
    //! Shared fixtures for handler tests: an in-memory app with four seeded
    //! users and helpers that attach a bearer token and peer address.

    use super::*;
    use crate::{
        api::leave_request::CreateLeave,
        auth::{jwt::generate_access_token, password::hash_password, policy::Actor},
        model::{
            role::Role,
            user::{NewUser, User},
        },
        service::LeaveService,
        store::Stores,
    };
    use actix_web::{
        App, Error,
        body::MessageBody,
        dev::{ServiceFactory, ServiceRequest, ServiceResponse},
        test::TestRequest,
        web::Data,
    };
    use serde_json::Value;

    pub const PEER: &str = "127.0.0.1:40000";
    pub const PASSWORD: &str = "secret123";

    pub struct TestApp {
        pub config: Config,
        pub stores: Stores,
        pub limits: RateLimits,
        pub admin: User,
        pub manager: User,
        pub other_manager: User,
        pub employee: User,
    }

    impl TestApp {
        pub fn empty() -> Self {
            Self::with_config(Config::for_tests())
        }

        pub fn with_config(config: Config) -> Self {
            let limits = RateLimits::from_config(&config).unwrap();
            let placeholder = |id| User {
                id,
                full_name: String::new(),
                email: String::new(),
                role: Role::Employee,
                manager: None,
                department: None,
                position: None,
                status: crate::model::user::UserStatus::Active,
                phone: None,
                address: None,
                bio: None,
                created_at: chrono::Utc::now(),
            };
            Self {
                config,
                stores: Stores::in_memory(),
                limits,
                admin: placeholder(0),
                manager: placeholder(0),
                other_manager: placeholder(0),
                employee: placeholder(0),
            }
        }

        /// Ada (admin), Mia and Max (managers) and Eli (employee reporting to Mia).
        pub async fn seeded() -> Self {
            let mut ctx = Self::empty();
            ctx.admin = ctx.add_user("Ada Admin", "ada@corp.test", Role::Admin, None).await;
            ctx.manager = ctx.add_user("Mia Manager", "mia@corp.test", Role::Manager, None).await;
            ctx.other_manager = ctx.add_user("Max Manager", "max@corp.test", Role::Manager, None).await;
            ctx.employee = ctx
                .add_user("Eli Employee", "eli@corp.test", Role::Employee, Some(ctx.manager.id))
                .await;
            ctx
        }

        pub async fn add_user(&self, name: &str, email: &str, role: Role, manager: Option<u64>) -> User {
            self.stores
                .users
                .insert(NewUser {
                    full_name: name.to_string(),
                    email: email.to_string(),
                    password_hash: hash_password(PASSWORD).unwrap(),
                    role,
                    manager,
                    department: None,
                    position: None,
                })
                .await
                .unwrap()
        }

        pub fn app(
            &self,
        ) -> App<
            impl ServiceFactory<
                ServiceRequest,
                Config = (),
                Response = ServiceResponse<impl MessageBody + use<>>,
                Error = Error,
                InitError = (),
            > + use<>,
        > {
            let config = self.config.clone();
            let limits = self.limits.clone();
            App::new()
                .app_data(Data::new(self.config.clone()))
                .app_data(Data::new(self.stores.clone()))
                .app_data(Data::new(LeaveService::new(&self.stores)))
                .configure(move |cfg| configure(cfg, &config, &limits))
        }

        pub fn token(&self, user: &User) -> String {
            generate_access_token(
                user.id,
                user.email.clone(),
                user.role,
                &self.config.jwt_secret,
                self.config.access_token_ttl,
            )
            .unwrap()
        }

        pub fn anonymous(&self, method: actix_web::http::Method, uri: &str) -> TestRequest {
            TestRequest::default()
                .method(method)
                .uri(uri)
                .peer_addr(PEER.parse().unwrap())
        }

        fn authed(&self, method: actix_web::http::Method, uri: &str, user: &User) -> TestRequest {
            self.anonymous(method, uri)
                .insert_header(("Authorization", format!("Bearer {}", self.token(user))))
        }

        pub fn get(&self, uri: &str, user: &User) -> TestRequest {
            self.authed(actix_web::http::Method::GET, uri, user)
        }

        pub fn post(&self, uri: &str, user: &User) -> TestRequest {
            self.authed(actix_web::http::Method::POST, uri, user)
        }

        pub fn put(&self, uri: &str, user: &User) -> TestRequest {
            self.authed(actix_web::http::Method::PUT, uri, user)
        }

        pub fn delete(&self, uri: &str, user: &User) -> TestRequest {
            self.authed(actix_web::http::Method::DELETE, uri, user)
        }

        /// Submits a leave request for `user` through the lifecycle service.
        pub async fn submit(&self, user: &User, body: Value) -> u64 {
            let new = serde_json::from_value::<CreateLeave>(body)
                .unwrap()
                .validate()
                .unwrap();
            LeaveService::new(&self.stores)
                .create(&Actor::new(user.id, user.role), new)
                .await
                .unwrap()
                .id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::TestApp;
    use super::*;
    use actix_web::{http::StatusCode, test as actix_test};

    #[test]
    fn zero_rate_limit_is_a_config_error() {
        let mut config = Config::for_tests();
        config.rate_login_per_min = 0;
        assert!(RateLimits::from_config(&config).is_err());
    }

    #[actix_web::test]
    async fn protected_routes_are_rate_limited_per_peer() {
        let mut config = Config::for_tests();
        config.rate_protected_per_min = 2;
        let mut ctx = TestApp::with_config(config);
        ctx.employee = ctx
            .add_user("Eli Employee", "eli@corp.test", crate::model::role::Role::Employee, None)
            .await;
        let app = actix_test::init_service(ctx.app()).await;

        for _ in 0..2 {
            let resp = actix_test::call_service(&app, ctx.get("/api/leaves/me", &ctx.employee).to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
        let resp = actix_test::call_service(&app, ctx.get("/api/leaves/me", &ctx.employee).to_request()).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[actix_web::test]
    async fn malformed_json_is_a_validation_error() {
        let ctx = TestApp::seeded().await;
        let app = actix_test::init_service(ctx.app()).await;

        let resp = actix_test::call_service(
            &app,
            ctx.post("/api/leaves", &ctx.employee)
                .insert_header(("Content-Type", "application/json"))
                .set_payload("{not json")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["errors"][0]["field"], "body");
    }
}
