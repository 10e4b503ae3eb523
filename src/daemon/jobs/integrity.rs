//! Stored chapter integrity checks and the update workflow

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::library::SourceDir;
use crate::types::ChapterRef;

use super::Job;

/// Outcome of checking a stored source folder against a chapter list
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Chapters that had a stored file
    pub checked: usize,
    /// Stored chapters that were unreadable or too short
    pub corrupted: Vec<u32>,
    /// Chapters without a stored file
    pub missing: Vec<u32>,
}

impl IntegrityReport {
    pub fn needs_download(&self) -> bool {
        !self.corrupted.is_empty() || !self.missing.is_empty()
    }
}

/// Compares stored chapter files against a fresh chapter list
#[derive(Debug, Clone)]
pub struct ChapterIntegrityChecker {
    min_body_len: usize,
    repair: bool,
}

impl ChapterIntegrityChecker {
    pub fn new(min_body_len: usize) -> Self {
        Self {
            min_body_len,
            repair: true,
        }
    }

    /// Whether corrupted chapter files are deleted so the next download pass
    /// fetches them again
    pub fn with_repair(mut self, repair: bool) -> Self {
        self.repair = repair;
        self
    }

    pub fn check(&self, dir: &SourceDir, chapters: &[ChapterRef]) -> IntegrityReport {
        let mut report = IntegrityReport::default();

        for chapter in chapters {
            if !dir.has_chapter(chapter.id) {
                report.missing.push(chapter.id);
                continue;
            }
            report.checked += 1;

            let reason = match dir.read_chapter(chapter.id) {
                Ok(stored) if stored.body.chars().count() >= self.min_body_len => continue,
                Ok(stored) => format!("body has {} characters", stored.body.chars().count()),
                Err(e) => e.to_string(),
            };

            debug!("Chapter {} in {} is corrupted: {}", chapter.id, dir.path().display(), reason);
            report.corrupted.push(chapter.id);
            if self.repair {
                if let Err(e) = dir.remove_chapter(chapter.id) {
                    warn!("Failed to delete corrupted chapter {}: {}", chapter.id, e);
                }
            }
        }

        report
    }
}

/// Update workflow for one job: refresh metadata, repair stored chapters,
/// and download only what is missing.
///
/// Runs on its own task; waiting for the metadata fetch never blocks a
/// request handler.
pub(super) async fn run_update(job: Arc<Job>, url: String, checker: ChapterIntegrityChecker) {
    job.prepare_direct_download(&url);
    job.wait_idle().await;

    let Some((dir, chapters)) = job.stored_target() else {
        debug!("Update of {} stopped: metadata not available", url);
        return;
    };

    job.set_last_action("Checking stored chapters");
    let report = checker.check(&dir, &chapters);
    job.services()
        .metrics
        .chapters_repaired
        .add(report.corrupted.len() as u64);

    if !report.needs_download() {
        info!("Update of {}: {} chapters intact, nothing to do", url, report.checked);
        job.services().metrics.updates_without_changes.inc();
        job.finish("No new chapters");
        return;
    }

    info!(
        "Update of {}: {} missing, {} corrupted chapters",
        url,
        report.missing.len(),
        report.corrupted.len()
    );
    job.start_download();
}
