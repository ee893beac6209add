//! # tb-api
//!
//! The HTTP adapter for Tallyboard: an axum router over the services in
//! `tb-services`. Everything lives under `/api`, plus `/health` and `/metrics`.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod state;
pub mod validation;

use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/me", get(handlers::me).delete(handlers::delete_me))
        .route("/users/{handle}", get(handlers::profile))
        .route("/admin/users", delete(handlers::delete_all_accounts))
        .route("/posts", get(handlers::list_posts).post(handlers::create_post))
        .route("/posts/{id}", get(handlers::get_post))
        .route("/votes", post(handlers::vote))
        .route("/milestones", get(handlers::list_milestones))
        .route("/milestones/trigger", post(handlers::trigger_milestone))
}

/// The full application with its layers; `request_timeout` bounds every request.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::request_timeout(request_timeout))
        .layer(middleware::cors_policy())
        .layer(middleware::trace_layer())
        .with_state(state)
}
