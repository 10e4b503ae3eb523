//! Active job state machine
//!
//! A job runs at most one background operation at a time. The `busy` flag
//! is raised by whoever dispatches an operation and lowered when it ends, so
//! polling callers can read [`Job::status`] at any moment without waiting.
//! Terminal outcomes go through [`Job::destroy`], which swaps the registry
//! entry for a [`FinishedJob`] on a separate task.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::library::{LibraryError, NovelMeta, SourceDir};
use crate::source::{FetchProgress, SourceAdapter};
use crate::types::{ChapterRef, NovelHit, NovelMetadata, SourceListing};
use crate::util::{host_slug, quote_plus, slugify};

use super::download::DownloadPass;
use super::progress::{ProgressEstimator, ProgressSample};
use super::{FinishedJob, JobError, JobServices, Snapshot, WorkerPool};

/// Stage of the job state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Created,
    Searching,
    SourceSelectionPending,
    MetadataDownloading,
    Downloading,
    Compressing,
    UpdatingCatalog,
    Finished,
    Crashed,
}

/// Mutable part of a job. Never held across an `.await`.
pub struct JobState {
    pub phase: JobPhase,
    pub crashed: bool,
    pub original_query: String,
    pub search_results: Option<Vec<NovelHit>>,
    pub selected_novel: Option<usize>,
    pub selected_source: Option<usize>,
    pub metadata_downloaded: bool,
    pub last_action: String,
    pub last_activity: DateTime<Utc>,
    pub novel: Option<NovelMetadata>,
    pub adapter: Option<Arc<dyn SourceAdapter>>,
    pub novel_slug: Option<String>,
    pub source_slug: Option<String>,
    pub output_dir: Option<SourceDir>,
}

impl JobState {
    fn new() -> Self {
        Self {
            phase: JobPhase::Created,
            crashed: false,
            original_query: String::new(),
            search_results: None,
            selected_novel: None,
            selected_source: None,
            metadata_downloaded: false,
            last_action: "Created job".to_string(),
            last_activity: Utc::now(),
            novel: None,
            adapter: None,
            novel_slug: None,
            source_slug: None,
            output_dir: None,
        }
    }

    fn set_last_action(&mut self, action: impl Into<String>) {
        self.last_action = action.into();
        self.last_activity = Utc::now();
    }
}

/// Everything the download step needs, read out of the state in one go
struct DownloadTarget {
    novel: NovelMetadata,
    adapter: Arc<dyn SourceAdapter>,
    dir: SourceDir,
    novel_slug: String,
    source_slug: String,
}

/// One active job
pub struct Job {
    job_id: String,
    services: Arc<JobServices>,
    state: RwLock<JobState>,
    busy: watch::Sender<bool>,
    progress: FetchProgress,
    estimator: Mutex<ProgressEstimator>,
    pool: WorkerPool,
    destroyed: AtomicBool,
    started: Instant,
}

impl Job {
    pub fn new(job_id: &str, services: Arc<JobServices>) -> Arc<Self> {
        let (busy, _) = watch::channel(false);
        let pool = WorkerPool::new(job_id, services.config.workers);
        Arc::new(Self {
            job_id: job_id.to_string(),
            services,
            state: RwLock::new(JobState::new()),
            busy,
            progress: FetchProgress::new(),
            estimator: Mutex::new(ProgressEstimator::new()),
            pool,
            destroyed: AtomicBool::new(false),
            started: Instant::now(),
        })
    }

    /// Fresh job waiting for source selection, rebuilt from a snapshot
    pub fn from_snapshot(services: Arc<JobServices>, snapshot: &Snapshot) -> Arc<Self> {
        let job = Self::new(&snapshot.job_id, services);
        {
            let mut state = job.state.write();
            state.original_query = snapshot.original_query.clone();
            state.search_results = Some(snapshot.search_results.clone());
            state.phase = JobPhase::SourceSelectionPending;
            state.set_last_action("Snapshot restored");
        }
        job
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn services(&self) -> &Arc<JobServices> {
        &self.services
    }

    pub fn is_busy(&self) -> bool {
        *self.busy.borrow()
    }

    pub fn phase(&self) -> JobPhase {
        self.state.read().phase
    }

    pub fn is_crashed(&self) -> bool {
        self.state.read().crashed
    }

    pub fn metadata_downloaded(&self) -> bool {
        self.state.read().metadata_downloaded
    }

    pub fn original_query(&self) -> String {
        self.state.read().original_query.clone()
    }

    pub fn search_results(&self) -> Option<Vec<NovelHit>> {
        self.state.read().search_results.clone()
    }

    pub fn last_action(&self) -> String {
        self.state.read().last_action.clone()
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.state.read().last_activity
    }

    /// Wait until no background operation owns the job
    pub async fn wait_idle(&self) {
        let mut rx = self.busy.subscribe();
        // The sender lives as long as `self`
        let _ = rx.wait_for(|busy| !*busy).await;
    }

    /// Current status for polling callers. Never waits on a background
    /// operation.
    pub fn status(&self) -> String {
        if !self.is_busy() {
            return "No current task".to_string();
        }

        let (phase, last_action) = {
            let state = self.state.read();
            (state.phase, state.last_action.clone())
        };
        let sample = ProgressSample {
            phase,
            last_action: &last_action,
            processed: self.progress.processed(),
            explicit_phase: self.progress.phase(),
            sources_total: self.services.sources.searchable_count() as u64,
            chapters_total: self.progress.chapters_total(),
            images_total: self.progress.images_total(),
        };
        let status = self.estimator.lock().status(sample);
        debug!("Status of {}: {}", self.job_id, status);
        status
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn set_busy(&self, busy: bool) {
        self.busy.send_replace(busy);
    }

    pub fn set_last_action(&self, action: impl Into<String>) {
        self.state.write().set_last_action(action);
    }

    fn transition(&self, phase: JobPhase, action: impl Into<String>) {
        let action = action.into();
        info!("Job {}: {:?} - {}", self.job_id, phase, action);
        let mut state = self.state.write();
        state.phase = phase;
        state.set_last_action(action);
    }

    /// Run `operation` on the job's pool with `busy` raised
    fn dispatch<F>(self: &Arc<Self>, operation: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.set_busy(true);
        if !self.pool.submit(operation) {
            warn!("Job {} no longer accepts work", self.job_id);
            self.set_busy(false);
        }
    }

    /// Start searching every source for `query`
    pub fn begin_search(self: &Arc<Self>, query: &str) {
        self.state.write().original_query = query.to_string();
        let job = Arc::clone(self);
        let query = query.to_string();
        self.dispatch(async move { job.run_search(query).await });
    }

    async fn run_search(self: Arc<Self>, query: String) {
        if query.chars().count() < self.services.config.min_query_len {
            debug!("Job {}: query '{}' too short, not searching", self.job_id, query);
            self.set_busy(false);
            return;
        }

        self.transition(JobPhase::Searching, "Preparing search");
        self.progress.reset();
        self.progress.set_phase(None);
        self.set_last_action("Searching");
        self.services.metrics.searches_total.inc();

        let hits = match self.services.sources.search(&query, &self.progress).await {
            Ok(hits) => hits,
            Err(e) => {
                self.services.metrics.searches_failed.inc();
                return self.crash(format!("Fail to search novel : {}", e));
            }
        };
        info!("Job {}: {} novels found for '{}'", self.job_id, hits.len(), query);
        self.state.write().search_results = Some(hits);

        self.set_last_action("Creating snapshot");
        self.create_snapshot();

        self.transition(JobPhase::SourceSelectionPending, "Search finished");
        self.set_busy(false);
    }

    fn create_snapshot(&self) {
        let snapshot = {
            let state = self.state.read();
            state.search_results.as_ref().map(|results| Snapshot {
                job_id: self.job_id.clone(),
                original_query: state.original_query.clone(),
                search_results: results.clone(),
                captured_at: Utc::now(),
            })
        };
        match snapshot {
            Some(snapshot) => self.services.snapshots.save(snapshot),
            None => warn!("Job {}: no search results to snapshot", self.job_id),
        }
    }

    /// Pick a novel from the search results and list its sources
    pub fn select_novel(&self, novel_index: usize) -> Result<SourceListing, JobError> {
        let mut state = self.state.write();
        let results = state
            .search_results
            .as_ref()
            .filter(|r| !r.is_empty())
            .ok_or(JobError::NoSearchResults)?;
        let novel = results.get(novel_index).ok_or_else(|| {
            JobError::InvalidSelection(format!(
                "Invalid novel_id {} ({} novels found)",
                novel_index,
                results.len()
            ))
        })?;

        let listing = SourceListing::from(novel);
        state.selected_novel = Some(novel_index);
        state.set_last_action("Source selection");
        Ok(listing)
    }

    /// Pick a source of the selected novel and fetch the novel's metadata
    pub fn select_source(self: &Arc<Self>, source_index: usize) -> Result<(), JobError> {
        let url = {
            let mut state = self.state.write();
            let novel_index = state.selected_novel.ok_or(JobError::NoNovelSelected)?;
            let novel = state
                .search_results
                .as_ref()
                .and_then(|r| r.get(novel_index))
                .ok_or(JobError::NoNovelSelected)?;
            let link = novel.sources.get(source_index).ok_or_else(|| {
                JobError::InvalidSelection(format!(
                    "Invalid source_id {} ({} sources available)",
                    source_index,
                    novel.sources.len()
                ))
            })?;
            let url = link.url.clone();
            state.selected_source = Some(source_index);
            url
        };

        self.set_busy(true);
        self.transition(JobPhase::MetadataDownloading, format!("Selected {}", url));
        let adapter = match self.services.sources.adapter_for(&url) {
            Ok(adapter) => adapter,
            Err(e) => {
                self.crash(format!("Fail to init source : {}", e));
                return Ok(());
            }
        };

        self.set_last_action("Getting information about your novel...");
        let job = Arc::clone(self);
        self.dispatch(async move { job.fetch_metadata(url, adapter).await });
        Ok(())
    }

    /// Skip search and selection: fetch metadata for a novel URL directly
    pub fn prepare_direct_download(self: &Arc<Self>, url: &str) {
        self.state.write().original_query = url.to_string();
        self.set_busy(true);
        self.transition(JobPhase::MetadataDownloading, "Preparing source");

        let adapter = match self.services.sources.adapter_for(url) {
            Ok(adapter) => adapter,
            Err(e) => return self.crash(format!("Fail to init source : {}", e)),
        };
        let job = Arc::clone(self);
        let url = url.to_string();
        self.dispatch(async move { job.fetch_metadata(url, adapter).await });
    }

    async fn fetch_metadata(self: Arc<Self>, url: String, adapter: Arc<dyn SourceAdapter>) {
        self.transition(JobPhase::MetadataDownloading, "Getting novel information...");

        let novel = match adapter.fetch_novel(&url).await {
            Ok(novel) => novel,
            Err(e) => return self.crash(format!("Failed to get novel info : {}", e)),
        };

        let novel_slug = slugify(&novel.title);
        if novel_slug.is_empty() {
            return self.crash(format!(
                "Failed to get novel info : no usable title for {}",
                url
            ));
        }
        let Some(source_slug) = host_slug(&novel.home_url) else {
            return self.crash(format!(
                "Failed to get novel info : invalid source URL {}",
                novel.home_url
            ));
        };

        let dir = match self.services.library.ensure_source_dir(&novel_slug, &source_slug) {
            Ok(dir) => dir,
            Err(e) => return self.crash(format!("Failed to prepare output folder : {}", e)),
        };
        info!(
            "Job {}: '{}' has {} chapters, output in {}",
            self.job_id,
            novel.title,
            novel.chapters.len(),
            dir.path().display()
        );

        {
            let mut state = self.state.write();
            state.novel = Some(novel);
            state.adapter = Some(adapter);
            state.novel_slug = Some(novel_slug);
            state.source_slug = Some(source_slug);
            state.output_dir = Some(dir);
            state.metadata_downloaded = true;
        }
        self.transition(JobPhase::SourceSelectionPending, "Novel information ready");
        self.set_busy(false);
    }

    /// Output folder and chapter list, once metadata is known and the job is
    /// still healthy
    pub fn stored_target(&self) -> Option<(SourceDir, Vec<ChapterRef>)> {
        let state = self.state.read();
        if state.crashed || !state.metadata_downloaded {
            return None;
        }
        let dir = state.output_dir.clone()?;
        let chapters = state.novel.as_ref()?.chapters.clone();
        Some((dir, chapters))
    }

    /// Download the body of the novel, write its metadata and register it
    pub fn start_download(self: &Arc<Self>) {
        let job = Arc::clone(self);
        self.dispatch(async move { job.run_download().await });
    }

    fn download_target(&self) -> Option<DownloadTarget> {
        let state = self.state.read();
        Some(DownloadTarget {
            novel: state.novel.clone()?,
            adapter: state.adapter.clone()?,
            dir: state.output_dir.clone()?,
            novel_slug: state.novel_slug.clone()?,
            source_slug: state.source_slug.clone()?,
        })
    }

    async fn run_download(self: Arc<Self>) {
        let Some(target) = self.download_target() else {
            return self.crash("Download failed : novel information is missing".to_string());
        };

        self.transition(JobPhase::Downloading, "Downloading");
        let pass = DownloadPass {
            adapter: target.adapter.as_ref(),
            novel: &target.novel,
            dir: &target.dir,
            progress: &self.progress,
            metrics: &self.services.metrics,
            workers: self.pool.size(),
        };
        let outcome = match pass.run().await {
            Ok(outcome) => outcome,
            Err(e) => return self.crash(format!("Download failed : {}", e)),
        };

        self.transition(JobPhase::Compressing, "Compressing");
        let meta = NovelMeta::from_novel(&target.novel, &target.source_slug, outcome.cover);
        if let Err(e) = target.dir.write_meta(&meta) {
            return self.crash(format!("Download failed : {}", e));
        }
        self.set_last_action("Finished downloading");

        self.transition(JobPhase::UpdatingCatalog, "Updating catalog");
        let message = match self.update_catalog(&target.dir, &target.novel_slug) {
            Ok(()) => "Successfully downloaded, destroying session".to_string(),
            Err(e) => {
                warn!("Job {}: catalog update failed: {}", self.job_id, e);
                format!("Downloaded, but catalog update failed: {}", e)
            }
        };
        self.finish(message);
    }

    fn update_catalog(&self, dir: &SourceDir, novel_slug: &str) -> Result<(), LibraryError> {
        let meta = dir.touch_last_update()?;
        self.services.catalog.register(novel_slug, &meta);
        Ok(())
    }

    /// End the job successfully with `message`
    pub fn finish(self: &Arc<Self>, message: impl Into<String>) {
        self.set_busy(true);
        self.transition(JobPhase::Finished, message);
        self.destroy();
    }

    /// End the job as failed. `reason` becomes its final message.
    fn crash(self: &Arc<Self>, reason: String) {
        error!("Job {} crashed: {}", self.job_id, reason);
        {
            let mut state = self.state.write();
            state.crashed = true;
            state.phase = JobPhase::Crashed;
            state.set_last_action(reason);
        }
        self.destroy();
    }

    /// Terminal record for the current state
    pub fn to_finished(&self) -> FinishedJob {
        let state = self.state.read();
        let success = !state.crashed;
        let url = match (&state.novel_slug, &state.source_slug) {
            (Some(novel), Some(source)) if success => {
                Some(format!("{}/{}", quote_plus(novel), quote_plus(source)))
            }
            _ => None,
        };
        FinishedJob {
            job_id: self.job_id.clone(),
            success,
            message: state.last_action.clone(),
            end_date: state.last_activity,
            original_query: state.original_query.clone(),
            url,
        }
    }

    /// Replace this job by its finished record. Runs on a separate task and
    /// only once per job.
    pub fn destroy(self: &Arc<Self>) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let job = Arc::clone(self);
        tokio::spawn(async move { job.teardown() });
    }

    fn teardown(self: Arc<Self>) {
        let finished = Arc::new(self.to_finished());
        let success = finished.success;

        let replaced = self
            .services
            .registry
            .replace_if_current(&self.job_id, &self, finished);
        if !replaced {
            debug!("Job {} was superseded, registry left untouched", self.job_id);
        }

        self.pool.shutdown();
        if success && replaced && self.services.snapshots.delete(&self.job_id) {
            debug!("Deleted snapshot of job {}", self.job_id);
        }
        self.services.metrics.record_finished(success, self.started.elapsed());

        self.set_busy(false);
        info!("Session destroyed: {}", self.job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobsConfig;
    use crate::library::{Catalog, Library};
    use crate::source::SourceRegistry;
    use tempfile::TempDir;

    fn services(temp: &TempDir) -> Arc<JobServices> {
        Arc::new(JobServices::new(
            JobsConfig::default(),
            Arc::new(SourceRegistry::new(vec![])),
            Library::new(temp.path()),
            Arc::new(Catalog::new()),
        ))
    }

    #[test]
    fn test_new_job_is_idle() {
        let temp = TempDir::new().unwrap();
        let job = Job::new("job-1", services(&temp));

        assert!(!job.is_busy());
        assert_eq!(job.phase(), JobPhase::Created);
        assert_eq!(job.status(), "No current task");
        assert_eq!(job.last_action(), "Created job");
        assert!(job.search_results().is_none());
    }

    #[tokio::test]
    async fn test_short_query_leaves_job_idle() {
        let temp = TempDir::new().unwrap();
        let services = services(&temp);
        let job = Job::new("job-1", services.clone());

        job.begin_search("abc");
        job.wait_idle().await;

        assert!(!job.is_busy());
        assert_eq!(job.phase(), JobPhase::Created);
        assert_eq!(job.status(), "No current task");
        assert_eq!(job.original_query(), "abc");
        assert!(job.search_results().is_none());
        assert_eq!(services.metrics.searches_total.get(), 0);
        assert!(!services.snapshots.exists("job-1"));
    }

    #[tokio::test]
    async fn test_search_without_sources_waits_for_selection() {
        let temp = TempDir::new().unwrap();
        let services = services(&temp);
        let job = Job::new("job-1", services.clone());

        job.begin_search("lord of mysteries");
        job.wait_idle().await;

        assert_eq!(job.phase(), JobPhase::SourceSelectionPending);
        assert_eq!(job.search_results(), Some(Vec::new()));
        assert_eq!(services.metrics.searches_total.get(), 1);
        assert!(services.snapshots.exists("job-1"));
    }
}
