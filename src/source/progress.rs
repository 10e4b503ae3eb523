//! Shared fetch progress counters
//!
//! Written by whatever is doing the fetching (search fan-out, download pass)
//! and read by status polling without any locking.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Sub-phase of a download pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Chapters,
    Images,
}

impl FetchPhase {
    fn to_raw(phase: Option<Self>) -> u8 {
        match phase {
            None => 0,
            Some(Self::Chapters) => 1,
            Some(Self::Images) => 2,
        }
    }

    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::Chapters),
            2 => Some(Self::Images),
            _ => None,
        }
    }
}

/// "Items processed" counter plus optional phase signal for one fetch process
#[derive(Debug, Default)]
pub struct FetchProgress {
    processed: AtomicU64,
    phase: AtomicU8,
    chapters_total: AtomicU64,
    images_total: AtomicU64,
}

impl FetchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new pass: the counter goes back to zero
    pub fn reset(&self) {
        self.processed.store(0, Ordering::Relaxed);
    }

    /// Mark one more item as processed
    pub fn advance(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Publish the current sub-phase. `None` means the fetcher gives no signal.
    pub fn set_phase(&self, phase: Option<FetchPhase>) {
        self.phase.store(FetchPhase::to_raw(phase), Ordering::Relaxed);
    }

    pub fn phase(&self) -> Option<FetchPhase> {
        FetchPhase::from_raw(self.phase.load(Ordering::Relaxed))
    }

    pub fn set_chapters_total(&self, total: u64) {
        self.chapters_total.store(total, Ordering::Relaxed);
    }

    pub fn chapters_total(&self) -> u64 {
        self.chapters_total.load(Ordering::Relaxed)
    }

    pub fn set_images_total(&self, total: u64) {
        self.images_total.store(total, Ordering::Relaxed);
    }

    pub fn images_total(&self) -> u64 {
        self.images_total.load(Ordering::Relaxed)
    }
}
