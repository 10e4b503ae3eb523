//! HTTP API configuration

use serde::{Deserialize, Serialize};

/// HTTP API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address for HTTP server (e.g., "0.0.0.0:5000")
    pub listen_addr: String,
    /// API keys for authentication (empty = no auth required)
    pub api_keys: Vec<String>,
    /// Enable CORS (useful for browser-based clients)
    pub cors_enabled: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:5000".to_string(),
            api_keys: Vec::new(),
            cors_enabled: true,
        }
    }
}
