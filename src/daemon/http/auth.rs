//! HTTP API Authentication Middleware
//!
//! Optional API key check. With no keys configured every request passes.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::debug;

use super::types::ApiResponse;

/// Shared state for authentication
#[derive(Clone)]
pub struct AuthState {
    /// Valid API keys (empty means no auth required)
    api_keys: Arc<Vec<String>>,
}

impl AuthState {
    pub fn new(api_keys: Vec<String>) -> Self {
        Self {
            api_keys: Arc::new(api_keys),
        }
    }

    pub fn auth_required(&self) -> bool {
        !self.api_keys.is_empty()
    }

    pub fn validate_key(&self, key: &str) -> bool {
        !self.auth_required() || self.api_keys.iter().any(|k| k == key)
    }
}

/// Key from an `Authorization` header: "Bearer <key>" or just "<key>"
fn extract_key(header_value: &str) -> &str {
    header_value
        .strip_prefix("Bearer ")
        .unwrap_or(header_value)
        .trim()
}

/// Authentication middleware
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !auth.auth_required() {
        return next.run(request).await;
    }

    let api_key = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(extract_key);

    match api_key {
        Some(key) if auth.validate_key(key) => next.run(request).await,
        _ => {
            debug!("Rejected unauthenticated request to {}", request.uri().path());
            (StatusCode::UNAUTHORIZED, Json(ApiResponse::unauthorized())).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_state_no_keys() {
        let auth = AuthState::new(vec![]);
        assert!(!auth.auth_required());
        assert!(auth.validate_key("anything"));
    }

    #[test]
    fn test_auth_state_with_keys() {
        let auth = AuthState::new(vec!["secret123".to_string(), "key456".to_string()]);
        assert!(auth.auth_required());
        assert!(auth.validate_key("secret123"));
        assert!(!auth.validate_key("wrong"));
    }

    #[test]
    fn test_extract_key() {
        assert_eq!(extract_key("Bearer secret123"), "secret123");
        assert_eq!(extract_key(" secret123 "), "secret123");
    }
}
