//! Novel acquisition handlers
//!
//! Every endpoint answers immediately. Work happens in the background and
//! clients poll the same endpoint until it stops answering `pending`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::debug;

use super::AppState;
use crate::daemon::http::types::ApiResponse;
use crate::daemon::jobs::{DownloadStatus, JobError, Poll, UpdateStatus};

/// Query parameters shared by the `/api/addnovel/*` endpoints
#[derive(Debug, Default, Deserialize)]
pub struct AddNovelParams {
    pub job_id: Option<String>,
    pub query: Option<String>,
    pub novel_id: Option<String>,
    pub source_id: Option<String>,
    pub url: Option<String>,
}

fn reply(code: StatusCode, body: ApiResponse) -> Response {
    (code, Json(body)).into_response()
}

fn rejection(err: JobError) -> Response {
    debug!("Request rejected: {}", err);
    let code = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
    reply(code, ApiResponse::error(err.to_string()))
}

fn parse_index(value: Option<&str>, name: &'static str) -> Result<usize, JobError> {
    value
        .and_then(|v| v.trim().parse().ok())
        .ok_or(JobError::InvalidParameter(name))
}

fn download_reply(status: DownloadStatus) -> Response {
    match status {
        DownloadStatus::Pending(message) => reply(StatusCode::ACCEPTED, ApiResponse::pending(message)),
        DownloadStatus::Succeeded { message, url } => {
            reply(StatusCode::OK, ApiResponse::success().message(message).url(url))
        }
        DownloadStatus::Failed { message } => {
            reply(StatusCode::INTERNAL_SERVER_ERROR, ApiResponse::error(message))
        }
    }
}

/// GET /api/addnovel/create_session
pub async fn create_session(
    State(state): State<AppState>,
    Query(params): Query<AddNovelParams>,
) -> Response {
    match state
        .manager
        .create_session(params.job_id.as_deref(), params.query.as_deref())
    {
        Ok(()) => reply(StatusCode::OK, ApiResponse::success()),
        Err(e) => rejection(e),
    }
}

/// GET /api/addnovel/get_novels_founds
pub async fn get_novels_founds(
    State(state): State<AppState>,
    Query(params): Query<AddNovelParams>,
) -> Response {
    match state.manager.novels_found(params.job_id.as_deref()) {
        Ok(Poll::Ready(novels)) => reply(StatusCode::OK, ApiResponse::success().novels(novels)),
        Ok(Poll::Pending(message)) => reply(StatusCode::ACCEPTED, ApiResponse::pending(message)),
        Err(e) => rejection(e),
    }
}

/// GET /api/addnovel/get_sources_founds
pub async fn get_sources_founds(
    State(state): State<AppState>,
    Query(params): Query<AddNovelParams>,
) -> Response {
    let result = parse_index(params.novel_id.as_deref(), "novel_id")
        .and_then(|novel_id| state.manager.sources_found(params.job_id.as_deref(), novel_id));

    match result {
        Ok(Poll::Ready(sources)) => reply(StatusCode::OK, ApiResponse::success().sources(sources)),
        Ok(Poll::Pending(message)) => reply(StatusCode::ACCEPTED, ApiResponse::pending(message)),
        Err(e) => rejection(e),
    }
}

/// GET /api/addnovel/download
pub async fn download(
    State(state): State<AppState>,
    Query(params): Query<AddNovelParams>,
) -> Response {
    let result = parse_index(params.novel_id.as_deref(), "novel_id").and_then(|novel_id| {
        let source_id = parse_index(params.source_id.as_deref(), "source_id")?;
        state
            .manager
            .download(params.job_id.as_deref(), novel_id, source_id)
    });

    match result {
        Ok(status) => download_reply(status),
        Err(e) => rejection(e),
    }
}

/// GET /api/addnovel/direct_download
pub async fn direct_download(
    State(state): State<AppState>,
    Query(params): Query<AddNovelParams>,
) -> Response {
    match state
        .manager
        .direct_download(params.job_id.as_deref(), params.url.as_deref())
    {
        Ok(status) => download_reply(status),
        Err(e) => rejection(e),
    }
}

/// GET /api/addnovel/update
pub async fn update(
    State(state): State<AppState>,
    Query(params): Query<AddNovelParams>,
) -> Response {
    match state
        .manager
        .update(params.job_id.as_deref(), params.url.as_deref())
    {
        Ok(UpdateStatus::Pending(message)) => {
            reply(StatusCode::ACCEPTED, ApiResponse::pending(message))
        }
        Ok(UpdateStatus::Finished { success: true, message }) => {
            reply(StatusCode::OK, ApiResponse::success().message(message))
        }
        Ok(UpdateStatus::Finished { success: false, message }) => {
            reply(StatusCode::OK, ApiResponse::error(message))
        }
        Err(e) => rejection(e),
    }
}

/// GET /api/addnovel/load_snapshot
pub async fn load_snapshot(
    State(state): State<AppState>,
    Query(params): Query<AddNovelParams>,
) -> Response {
    match state.manager.load_snapshot(params.job_id.as_deref()) {
        Ok(()) => reply(StatusCode::OK, ApiResponse::success().message("Snapshot loaded")),
        Err(e) => rejection(e),
    }
}
