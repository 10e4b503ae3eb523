//! Background Job Management
//!
//! Jobs are identified by a client-chosen id and driven by polling: every
//! request either triggers the next background step or reports progress,
//! and returns immediately.

mod download;
mod error;
mod finished;
mod integrity;
mod job;
mod pool;
mod progress;
mod registry;

pub use download::{DownloadError, DownloadOutcome, DownloadPass};
pub use error::JobError;
pub use finished::FinishedJob;
pub use integrity::{ChapterIntegrityChecker, IntegrityReport};
pub use job::{Job, JobPhase, JobState};
pub use pool::WorkerPool;
pub use progress::{ProgressEstimator, ProgressSample};
pub use registry::{JobEntry, JobRegistry, Snapshot, SnapshotStore};

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::JobsConfig;
use crate::library::{Catalog, Library};
use crate::source::SourceRegistry;
use crate::types::{SearchResults, SourceListing};

use super::metrics::JobMetrics;

/// Shared services every job works with
pub struct JobServices {
    pub config: JobsConfig,
    pub sources: Arc<SourceRegistry>,
    pub library: Library,
    pub catalog: Arc<Catalog>,
    pub registry: Arc<JobRegistry>,
    pub snapshots: Arc<SnapshotStore>,
    pub metrics: Arc<JobMetrics>,
}

impl JobServices {
    pub fn new(
        config: JobsConfig,
        sources: Arc<SourceRegistry>,
        library: Library,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            config,
            sources,
            library,
            catalog,
            registry: Arc::new(JobRegistry::new()),
            snapshots: Arc::new(SnapshotStore::new()),
            metrics: JobMetrics::shared(),
        }
    }
}

/// Result of a poll that may still be waiting on a background operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    Ready(T),
    Pending(String),
}

/// Answer to a download request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Pending(String),
    Succeeded { message: String, url: Option<String> },
    Failed { message: String },
}

/// Answer to an update request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    Pending(String),
    Finished { success: bool, message: String },
}

/// Counts reported on `/status`
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    pub active_jobs: usize,
    pub finished_jobs: usize,
    pub snapshots: usize,
    pub catalog_novels: usize,
    pub sources: usize,
}

/// Treat missing and empty parameters alike
fn required<'a>(value: Option<&'a str>, missing: JobError) -> Result<&'a str, JobError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(missing),
    }
}

fn check_url(url: Option<&str>) -> Result<&str, JobError> {
    let url = required(url, JobError::MissingUrl)?;
    if !url.starts_with("http") {
        return Err(JobError::InvalidUrl);
    }
    Ok(url)
}

/// Request-facing entry point to the job system
#[derive(Clone)]
pub struct JobManager {
    services: Arc<JobServices>,
}

impl JobManager {
    pub fn new(services: JobServices) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    pub fn services(&self) -> &Arc<JobServices> {
        &self.services
    }

    fn lookup(&self, job_id: Option<&str>) -> Result<JobEntry, JobError> {
        let job_id = required(job_id, JobError::MissingJobId)?;
        self.services.registry.get(job_id).ok_or(JobError::UnknownJob)
    }

    fn register_new(&self, job_id: &str) -> Arc<Job> {
        let job = Job::new(job_id, Arc::clone(&self.services));
        self.services
            .registry
            .put(job_id, JobEntry::Active(Arc::clone(&job)));
        self.services.metrics.jobs_started.inc();
        job
    }

    /// Create (or overwrite) a job and start searching for `query`
    pub fn create_session(&self, job_id: Option<&str>, query: Option<&str>) -> Result<(), JobError> {
        let query = required(query, JobError::MissingQuery)?;
        if query.chars().count() < self.services.config.min_query_len {
            return Err(JobError::QueryTooShort);
        }
        let job_id = required(job_id, JobError::MissingJobId)?;

        info!("Creating session {} for '{}'", job_id, query);
        let job = self.register_new(job_id);
        job.begin_search(query);
        Ok(())
    }

    /// Search results once the search is done
    pub fn novels_found(&self, job_id: Option<&str>) -> Result<Poll<SearchResults>, JobError> {
        let job = match self.lookup(job_id)? {
            JobEntry::Finished(finished) => {
                return Err(JobError::AlreadyFinished(finished.status().to_string()))
            }
            JobEntry::Active(job) => job,
        };
        if job.is_busy() {
            return Ok(Poll::Pending(job.status()));
        }

        let results = job.search_results().ok_or(JobError::NoSearchResults)?;
        Ok(Poll::Ready(SearchResults::from_hits(
            &job.original_query(),
            &results,
        )))
    }

    /// Select a novel and list the sources carrying it
    pub fn sources_found(
        &self,
        job_id: Option<&str>,
        novel_id: usize,
    ) -> Result<Poll<SourceListing>, JobError> {
        let job = match self.lookup(job_id)? {
            JobEntry::Finished(finished) => {
                return Err(JobError::AlreadyFinished(finished.status().to_string()))
            }
            JobEntry::Active(job) => job,
        };
        if job.is_busy() {
            return Ok(Poll::Pending(job.status()));
        }
        job.select_novel(novel_id).map(Poll::Ready)
    }

    /// Drive a searched job: first call selects the source and fetches
    /// metadata, the next one downloads, later ones report the outcome.
    pub fn download(
        &self,
        job_id: Option<&str>,
        novel_id: usize,
        source_id: usize,
    ) -> Result<DownloadStatus, JobError> {
        let job = match self.lookup(job_id)? {
            JobEntry::Finished(finished) => return Ok(finished_download_status(&finished)),
            JobEntry::Active(job) => job,
        };
        if job.is_busy() {
            return Ok(DownloadStatus::Pending(job.status()));
        }

        if job.metadata_downloaded() {
            job.start_download();
        } else {
            job.select_novel(novel_id)?;
            job.select_source(source_id)?;
        }
        Ok(DownloadStatus::Pending(job.status()))
    }

    /// Same as [`JobManager::download`] for a novel URL, skipping search.
    ///
    /// A finished job for a different URL is replaced by a new job.
    pub fn direct_download(
        &self,
        job_id: Option<&str>,
        url: Option<&str>,
    ) -> Result<DownloadStatus, JobError> {
        let url = check_url(url)?;
        let job_id = required(job_id, JobError::MissingJobId)?;

        let job = match self.services.registry.get(job_id) {
            Some(JobEntry::Finished(finished)) if finished.original_query == url => {
                return Ok(finished_download_status(&finished));
            }
            Some(JobEntry::Active(job)) => job,
            Some(JobEntry::Finished(_)) | None => self.register_new(job_id),
        };
        if job.is_busy() {
            return Ok(DownloadStatus::Pending(job.status()));
        }

        if job.metadata_downloaded() {
            job.start_download();
        } else {
            job.prepare_direct_download(url);
        }
        Ok(DownloadStatus::Pending(job.status()))
    }

    /// Re-check a stored novel and download what changed.
    ///
    /// Refuses when the same URL finished an update within the cooldown.
    pub fn update(&self, job_id: Option<&str>, url: Option<&str>) -> Result<UpdateStatus, JobError> {
        let url = check_url(url)?;
        let job_id = required(job_id, JobError::MissingJobId)?;

        match self.services.registry.get(job_id) {
            Some(JobEntry::Finished(finished)) => {
                return Ok(UpdateStatus::Finished {
                    success: finished.success,
                    message: finished.status().to_string(),
                })
            }
            Some(JobEntry::Active(job)) => return Ok(UpdateStatus::Pending(job.status())),
            None => {}
        }

        let cooldown = chrono::Duration::seconds(self.services.config.update_cooldown_secs as i64);
        if self.services.registry.recently_finished(url, cooldown).is_some() {
            return Err(JobError::RecentlyUpdated);
        }

        info!("Starting update {} for {}", job_id, url);
        self.services.metrics.updates_started.inc();
        let job = self.register_new(job_id);
        let checker = ChapterIntegrityChecker::new(self.services.config.min_chapter_body_len);
        tokio::spawn(integrity::run_update(job, url.to_string(), checker));

        Ok(UpdateStatus::Pending("Creating session".to_string()))
    }

    /// Bring a finished job back to source selection from its snapshot
    pub fn load_snapshot(&self, job_id: Option<&str>) -> Result<(), JobError> {
        let job_id = required(job_id, JobError::InvalidJobId)?;
        let finished = match self.services.registry.get(job_id) {
            None => return Err(JobError::InvalidJobId),
            Some(JobEntry::Active(_)) => return Err(JobError::NotFinished),
            Some(JobEntry::Finished(finished)) => finished,
        };
        if !finished.snapshot_exists(&self.services) {
            return Err(JobError::NoSnapshot);
        }
        finished.restore_snapshot(&self.services)?;
        Ok(())
    }

    pub fn stats(&self) -> ManagerStats {
        let registry = &self.services.registry;
        let active_jobs = registry.active_count();
        ManagerStats {
            active_jobs,
            finished_jobs: registry.len().saturating_sub(active_jobs),
            snapshots: self.services.snapshots.len(),
            catalog_novels: self.services.catalog.len(),
            sources: self.services.sources.len(),
        }
    }
}

fn finished_download_status(finished: &FinishedJob) -> DownloadStatus {
    if finished.success {
        DownloadStatus::Succeeded {
            message: finished.status().to_string(),
            url: finished.url.clone(),
        }
    } else {
        DownloadStatus::Failed {
            message: finished.status().to_string(),
        }
    }
}
