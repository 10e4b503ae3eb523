//! Job registry and snapshot store
//!
//! Both maps are shared by every request handler and every job's background
//! operations. Entries are replaced whole, so readers see either the old or
//! the new value.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::types::NovelHit;

use super::{FinishedJob, Job};

/// Current state of one job identifier
#[derive(Clone)]
pub enum JobEntry {
    Active(Arc<Job>),
    Finished(Arc<FinishedJob>),
}

impl JobEntry {
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Active(job) => job.is_busy(),
            Self::Finished(_) => false,
        }
    }

    pub fn status(&self) -> String {
        match self {
            Self::Active(job) => job.status(),
            Self::Finished(finished) => finished.status().to_string(),
        }
    }

    pub fn original_query(&self) -> String {
        match self {
            Self::Active(job) => job.original_query(),
            Self::Finished(finished) => finished.original_query.clone(),
        }
    }
}

/// Job identifier -> current entry
#[derive(Default)]
pub struct JobRegistry {
    entries: DashMap<String, JobEntry>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `job_id`
    pub fn put(&self, job_id: &str, entry: JobEntry) {
        self.entries.insert(job_id.to_string(), entry);
    }

    pub fn get(&self, job_id: &str) -> Option<JobEntry> {
        self.entries.get(job_id).map(|e| e.value().clone())
    }

    /// Swap `job` for its finished record, but only if the registry still
    /// holds that exact job. Returns whether the swap happened.
    pub fn replace_if_current(
        &self,
        job_id: &str,
        job: &Arc<Job>,
        finished: Arc<FinishedJob>,
    ) -> bool {
        let Some(mut entry) = self.entries.get_mut(job_id) else {
            return false;
        };
        let is_current = matches!(entry.value(), JobEntry::Active(current) if Arc::ptr_eq(current, job));
        if is_current {
            *entry = JobEntry::Finished(finished);
        }
        is_current
    }

    /// Every entry whose original query equals `query`
    pub fn find_by_query(&self, query: &str) -> Vec<JobEntry> {
        self.entries
            .iter()
            .filter(|e| e.value().original_query() == query)
            .map(|e| e.value().clone())
            .collect()
    }

    /// A finished entry for `query` that ended less than `cooldown` ago
    pub fn recently_finished(&self, query: &str, cooldown: Duration) -> Option<Arc<FinishedJob>> {
        let now = Utc::now();
        self.find_by_query(query).into_iter().find_map(|entry| match entry {
            JobEntry::Finished(finished) if finished.end_date + cooldown > now => Some(finished),
            _ => None,
        })
    }

    pub fn active_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.value(), JobEntry::Active(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Search results preserved after a successful search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub job_id: String,
    pub original_query: String,
    pub search_results: Vec<NovelHit>,
    pub captured_at: DateTime<Utc>,
}

/// Job identifier -> snapshot
#[derive(Default)]
pub struct SnapshotStore {
    snapshots: DashMap<String, Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, snapshot: Snapshot) {
        self.snapshots.insert(snapshot.job_id.clone(), snapshot);
    }

    pub fn get(&self, job_id: &str) -> Option<Snapshot> {
        self.snapshots.get(job_id).map(|s| s.value().clone())
    }

    pub fn exists(&self, job_id: &str) -> bool {
        self.snapshots.contains_key(job_id)
    }

    pub fn delete(&self, job_id: &str) -> bool {
        self.snapshots.remove(job_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
