//! Terminal job records

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::{Job, JobEntry, JobError, JobServices};

/// What is left of a job once it completed or crashed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinishedJob {
    pub job_id: String,
    pub success: bool,
    /// Final status message
    pub message: String,
    pub end_date: DateTime<Utc>,
    pub original_query: String,
    /// `<novel_slug>/<source_slug>`, only set on success
    pub url: Option<String>,
}

impl FinishedJob {
    pub fn status(&self) -> &str {
        &self.message
    }

    pub fn snapshot_exists(&self, services: &JobServices) -> bool {
        services.snapshots.exists(&self.job_id)
    }

    /// Replace this record with a fresh job rebuilt from the search snapshot,
    /// ready for source selection.
    pub fn restore_snapshot(&self, services: &Arc<JobServices>) -> Result<Arc<Job>, JobError> {
        let snapshot = services
            .snapshots
            .get(&self.job_id)
            .ok_or(JobError::NoSnapshot)?;

        let job = Job::from_snapshot(Arc::clone(services), &snapshot);
        services.registry.put(&self.job_id, JobEntry::Active(Arc::clone(&job)));
        services.metrics.snapshots_restored.inc();
        info!(
            "Restored job {} from snapshot ({} novels)",
            self.job_id,
            snapshot.search_results.len()
        );
        Ok(job)
    }
}
