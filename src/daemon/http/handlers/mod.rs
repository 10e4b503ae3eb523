//! HTTP API Request Handlers
//!
//! Handlers that map HTTP requests to JobManager operations.

mod addnovel;
mod system;

use std::time::Instant;

use crate::daemon::jobs::JobManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub manager: JobManager,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(manager: JobManager) -> Self {
        Self {
            manager,
            started_at: Instant::now(),
        }
    }
}

pub use addnovel::{
    create_session, direct_download, download, get_novels_founds, get_sources_founds,
    load_snapshot, update,
};
pub use system::{health, prometheus_metrics, status};
