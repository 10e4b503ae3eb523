//! System handlers: health, status, metrics

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::AppState;
use crate::daemon::http::types::{HealthResponse, StatusResponse};

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Status endpoint
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.manager.stats();
    Json(StatusResponse {
        running: true,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        active_jobs: stats.active_jobs,
        finished_jobs: stats.finished_jobs,
        snapshots: stats.snapshots,
        catalog_novels: stats.catalog_novels,
        sources: stats.sources,
    })
}

/// Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.manager.stats();
    let gauges = [
        ("shelfd_active_jobs", "Jobs currently tracked as active", stats.active_jobs as u64),
        ("shelfd_finished_jobs", "Finished jobs kept for polling", stats.finished_jobs as u64),
        ("shelfd_snapshots", "Stored search snapshots", stats.snapshots as u64),
        ("shelfd_catalog_novels", "Novels in the catalog", stats.catalog_novels as u64),
    ];
    let body = state.manager.services().metrics.to_prometheus(&gauges);
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
