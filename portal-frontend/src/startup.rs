use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{request_id_middleware, security_headers_middleware};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    app::health_check,
    auth::{
        forget_password_page, login_handler, login_page, logout_handler, signup_handler,
        signup_page,
    },
    metrics::metrics,
    password::{forget_password_handler, reset_password_handler, reset_password_page},
    user::{dashboard_handler, personal_handler},
};
use crate::middleware::{metrics_middleware, session_guard};
use crate::AppState;

/// Application routes; every one of them, including unknown paths, passes
/// through the session guard.
fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/personal", get(personal_handler))
        .route("/login", get(login_page).post(login_handler))
        .route("/signup", get(signup_page).post(signup_handler))
        .route("/logout", post(logout_handler))
        .route(
            "/forget-password",
            get(forget_password_page).post(forget_password_handler),
        )
        .route(
            "/reset-password",
            get(reset_password_page).post(reset_password_handler),
        )
        .fallback(|| async { axum::http::StatusCode::NOT_FOUND })
        .layer(from_fn_with_state(state.clone(), session_guard))
        .with_state(state)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .merge(app_router(state))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
}
