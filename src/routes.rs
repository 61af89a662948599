use std::time::Duration;

use axum::{
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::AppState;

/// Login/register attempts allowed per client per window.
const AUTH_RATE_LIMIT: usize = 20;
const AUTH_RATE_WINDOW: Duration = Duration::from_secs(60);

fn cors_layer(config: &Config) -> CorsLayer {
    let origins = config.cors_allowed_origins.trim();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins == "*" {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(allowed)
}

pub fn create_router(state: AppState) -> Router {
    let auth_limiter = RateLimiter::new(AUTH_RATE_LIMIT, AUTH_RATE_WINDOW);

    let credential_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route_layer(middleware::from_fn_with_state(
            auth_limiter,
            rate_limit_middleware,
        ));

    let user_routes = Router::new()
        .route("/", get(handlers::admin::list_users))
        .route("/logout", post(handlers::auth::logout))
        .route("/profile", get(handlers::user::get_profile))
        .route("/enrolled", get(handlers::user::enrolled_courses))
        .route("/progress", get(handlers::user::enrollment_progress))
        .route("/certificates", get(handlers::user::my_certificates))
        .route("/results", get(handlers::user::my_results))
        .route(
            "/:id",
            get(handlers::user::get_user)
                .put(handlers::user::update_user)
                .delete(handlers::admin::delete_user),
        )
        .merge(credential_routes);

    let course_routes = Router::new()
        .route(
            "/",
            get(handlers::courses::list_courses).post(handlers::courses::create_course),
        )
        .route(
            "/:id",
            get(handlers::courses::get_course)
                .put(handlers::courses::update_course)
                .delete(handlers::courses::delete_course),
        )
        .route("/:id/enroll", post(handlers::courses::enroll))
        .route("/:id/progress", get(handlers::courses::course_progress))
        .route("/:id/mock-tests", get(handlers::courses::course_mock_tests));

    let video_routes = Router::new()
        .route(
            "/",
            get(handlers::videos::list_videos).post(handlers::videos::create_video),
        )
        .route(
            "/:id",
            get(handlers::videos::get_video)
                .put(handlers::videos::update_video)
                .delete(handlers::videos::delete_video),
        )
        .route("/:id/watched", post(handlers::videos::mark_watched))
        .route("/:id/progress", get(handlers::videos::video_progress));

    let mock_test_routes =
        Router::new().route("/:id/attempts", post(handlers::mock_tests::record_attempt));

    let teacher_routes = Router::new()
        .route("/stats", get(handlers::teacher::stats))
        .route(
            "/certificates",
            get(handlers::teacher::list_certificates).post(handlers::teacher::issue_certificate),
        )
        .route(
            "/exams",
            get(handlers::mock_tests::list_mock_tests).post(handlers::mock_tests::create_mock_test),
        )
        .route("/exams/:id", delete(handlers::mock_tests::delete_mock_test))
        .route("/results", get(handlers::mock_tests::teacher_results));

    let admin_routes = Router::new().route("/stats", get(handlers::admin::stats));

    let cors = cors_layer(&state.config);
    let timeout = Duration::from_secs(state.config.request_timeout_secs.max(1));

    Router::new()
        .nest("/users", user_routes)
        .nest("/courses", course_routes)
        .nest("/videos", video_routes)
        .nest("/mock-tests", mock_test_routes)
        .nest("/teacher", teacher_routes)
        .nest("/admin", admin_routes)
        .route("/regenerateToken", get(handlers::auth::regenerate_token))
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "ok": true }))
}
