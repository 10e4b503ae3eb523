//! HTTP API Request/Response Types
//!
//! JSON-serializable types for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::types::{SearchResults, SourceListing};

/// Outcome reported in every job endpoint response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Success,
    Pending,
    Error,
}

/// Response body of the `/api/addnovel/*` endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub novels: Option<SearchResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<SourceListing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ApiResponse {
    fn with_status(status: ApiStatus) -> Self {
        Self {
            status,
            message: None,
            novels: None,
            sources: None,
            url: None,
        }
    }

    pub fn success() -> Self {
        Self::with_status(ApiStatus::Success)
    }

    pub fn pending(message: impl Into<String>) -> Self {
        Self::with_status(ApiStatus::Pending).message(message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_status(ApiStatus::Error).message(message)
    }

    pub fn unauthorized() -> Self {
        Self::error("Invalid or missing API key")
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn novels(mut self, novels: SearchResults) -> Self {
        self.novels = Some(novels);
        self
    }

    pub fn sources(mut self, sources: SourceListing) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Destination path of a finished download. Always present on success,
    /// empty when it could not be computed.
    pub fn url(mut self, url: Option<String>) -> Self {
        self.url = Some(url.unwrap_or_default());
        self
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
}

/// Daemon status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub uptime_seconds: u64,
    /// Jobs with a background operation or waiting for the next request
    pub active_jobs: usize,
    pub finished_jobs: usize,
    pub snapshots: usize,
    pub catalog_novels: usize,
    pub sources: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_are_omitted() {
        let json = serde_json::to_value(ApiResponse::success()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "success" }));

        let json = serde_json::to_value(ApiResponse::pending("Searching (1/3)")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "pending", "message": "Searching (1/3)" })
        );
    }

    #[test]
    fn test_url_always_present_when_set() {
        let json = serde_json::to_value(ApiResponse::success().message("done").url(None)).unwrap();
        assert_eq!(json["url"], "");
    }
}
