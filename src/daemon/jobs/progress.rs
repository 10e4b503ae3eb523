//! Progress estimation for status polling
//!
//! Sources only expose an "items processed" counter. During a download pass
//! the same counter first counts chapters and then, after a reset, images.
//! When the fetcher publishes an explicit [`FetchPhase`] that signal is used.
//! Without it the image sub-phase is detected from the counter going
//! backwards, ignoring the first polls where the counter may still be
//! settling.

use crate::source::FetchPhase;

use super::JobPhase;

/// Polls to see during a download before a counter decrease is trusted
const MIN_POLLS_BEFORE_IMAGES: u32 = 8;

/// What one status poll observed
#[derive(Debug, Clone, Copy)]
pub struct ProgressSample<'a> {
    pub phase: JobPhase,
    pub last_action: &'a str,
    pub processed: u64,
    pub explicit_phase: Option<FetchPhase>,
    pub sources_total: u64,
    pub chapters_total: u64,
    pub images_total: u64,
}

/// Per-job status string builder. Keeps the state needed across polls.
#[derive(Debug, Default)]
pub struct ProgressEstimator {
    sources_to_search: Option<u64>,
    chapters_to_download: Option<u64>,
    images_to_download: Option<u64>,
    last_progress: u64,
    download_polls: u32,
    images_detected: bool,
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the status string for a busy job
    pub fn status(&mut self, sample: ProgressSample<'_>) -> String {
        let processed = sample.processed;

        let status = match sample.phase {
            JobPhase::Searching => {
                capture_once(&mut self.sources_to_search, sample.sources_total);
                format!(
                    "Searching ({}/{})",
                    processed,
                    self.sources_to_search.unwrap_or(0)
                )
            }
            JobPhase::Downloading => {
                self.download_polls += 1;
                capture_once(&mut self.chapters_to_download, sample.chapters_total);
                capture_once(&mut self.images_to_download, sample.images_total);

                if self.in_image_phase(sample.explicit_phase, processed) {
                    format!(
                        "Downloading images ({}/{})",
                        processed,
                        self.images_to_download.unwrap_or(0)
                    )
                } else {
                    format!(
                        "Downloading chapters ({}/{})",
                        processed,
                        self.chapters_to_download.unwrap_or(0)
                    )
                }
            }
            _ => sample.last_action.to_string(),
        };

        self.last_progress = processed;
        status
    }

    fn in_image_phase(&mut self, explicit: Option<FetchPhase>, processed: u64) -> bool {
        if let Some(phase) = explicit {
            return phase == FetchPhase::Images;
        }
        if processed < self.last_progress && self.download_polls >= MIN_POLLS_BEFORE_IMAGES {
            self.images_detected = true;
        }
        self.images_detected
    }
}

fn capture_once(slot: &mut Option<u64>, value: u64) {
    if slot.is_none() && value > 0 {
        *slot = Some(value);
    }
}
