pub mod admin;
pub mod attempts;
pub mod auth;
pub mod health;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::middleware::auth::{require_admin, require_user};
use crate::middleware::rate_limit::{rps_middleware, RateLimiter};
use crate::AppState;

/// Full HTTP surface. Transport layers (tracing, CORS) are added by the caller.
pub fn router(state: AppState, public_rps: u32, admin_rps: u32) -> Router {
    let auth_open = Router::new()
        .route("/api/auth/user/register", post(auth::register))
        .route("/api/auth/user/login", post(auth::login))
        .route("/api/auth/admin/login", post(auth::admin_login));

    let user_api = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/tests/start", post(attempts::start_test))
        .route("/api/tests/answer", post(attempts::submit_answer))
        .route("/api/tests/history", get(attempts::history))
        .route("/api/tests/:attempt_id", get(attempts::get_attempt))
        .route_layer(from_fn_with_state(state.clone(), require_user));

    let public_api = auth_open.merge(user_api).layer(from_fn_with_state(
        RateLimiter::new(public_rps),
        rps_middleware,
    ));

    let admin_api = Router::new()
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:id", get(admin::get_user))
        .route(
            "/api/admin/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/api/admin/questions/:id",
            get(admin::get_question)
                .put(admin::update_question)
                .delete(admin::delete_question),
        )
        .route(
            "/api/admin/test-configs",
            get(admin::list_test_configs).post(admin::upsert_test_config),
        )
        .route(
            "/api/admin/test-configs/:level",
            get(admin::get_test_config)
                .put(admin::update_test_config)
                .delete(admin::delete_test_config),
        )
        .route("/api/admin/attempts", get(admin::list_attempts))
        .route(
            "/api/admin/attempts/:id",
            get(admin::get_attempt).delete(admin::delete_attempt),
        )
        .route_layer(from_fn_with_state(state.clone(), require_admin))
        .layer(from_fn_with_state(
            RateLimiter::new(admin_rps),
            rps_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(public_api)
        .merge(admin_api)
        .with_state(state)
}
