//! HTTP API Route Definitions
//!
//! Defines the polling API routes for shelfd.

use axum::{middleware, routing::get, Router};

use super::auth::{auth_middleware, AuthState};
use super::handlers::{self, AppState};

/// Create the API router with all routes
pub fn create_router(app_state: AppState, auth_state: AuthState) -> Router {
    let addnovel = Router::new()
        .route("/create_session", get(handlers::create_session))
        .route("/get_novels_founds", get(handlers::get_novels_founds))
        .route("/get_sources_founds", get(handlers::get_sources_founds))
        .route("/download", get(handlers::download))
        .route("/direct_download", get(handlers::direct_download))
        .route("/update", get(handlers::update))
        .route("/load_snapshot", get(handlers::load_snapshot));

    let protected = Router::new()
        .nest("/api/addnovel", addnovel)
        .route("/status", get(handlers::status))
        .route("/metrics", get(handlers::prometheus_metrics))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    // Health check stays outside the auth layer
    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .with_state(app_state)
}
