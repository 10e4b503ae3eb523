//! Daemon Metrics Collection
//!
//! Counts job outcomes and fetch volume for the `/metrics` endpoint.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Atomic counter for thread-safe incrementing
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the counter by a value
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Histogram of job durations
#[derive(Debug)]
pub struct Histogram {
    /// Bucket boundaries in milliseconds
    buckets: Vec<u64>,
    counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Buckets from one second to one hour
    pub fn new_job_duration() -> Self {
        let buckets = vec![1_000, 5_000, 15_000, 60_000, 300_000, 900_000, 1_800_000, 3_600_000];
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, duration: Duration) {
        let millis = duration.as_millis() as u64;
        self.sum.fetch_add(millis, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        if let Some(i) = self.buckets.iter().position(|&b| millis <= b) {
            self.counts[i].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean_secs(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64 / 1000.0
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new_job_duration()
    }
}

/// All job metrics
#[derive(Debug, Default)]
pub struct JobMetrics {
    // Jobs
    pub jobs_started: Counter,
    pub jobs_succeeded: Counter,
    pub jobs_failed: Counter,
    pub job_duration: Histogram,

    // Searches
    pub searches_total: Counter,
    pub searches_failed: Counter,

    // Fetching
    pub chapters_fetched: Counter,
    pub chapters_repaired: Counter,
    pub images_fetched: Counter,
    pub images_failed: Counter,

    // Updates and snapshots
    pub updates_started: Counter,
    pub updates_without_changes: Counter,
    pub snapshots_restored: Counter,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Record the end of a job
    pub fn record_finished(&self, success: bool, elapsed: Duration) {
        if success {
            self.jobs_succeeded.inc();
        } else {
            self.jobs_failed.inc();
        }
        self.job_duration.observe(elapsed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_started: self.jobs_started.get(),
            jobs_succeeded: self.jobs_succeeded.get(),
            jobs_failed: self.jobs_failed.get(),
            job_duration_mean_secs: self.job_duration.mean_secs(),
            searches_total: self.searches_total.get(),
            searches_failed: self.searches_failed.get(),
            chapters_fetched: self.chapters_fetched.get(),
            chapters_repaired: self.chapters_repaired.get(),
            images_fetched: self.images_fetched.get(),
            images_failed: self.images_failed.get(),
            updates_started: self.updates_started.get(),
            updates_without_changes: self.updates_without_changes.get(),
            snapshots_restored: self.snapshots_restored.get(),
        }
    }

    /// Export all metrics in Prometheus exposition format.
    ///
    /// Gauges that live outside this struct (active jobs, catalog size) are
    /// passed in by the caller.
    pub fn to_prometheus(&self, gauges: &[(&str, &str, u64)]) -> String {
        let mut out = String::with_capacity(2048);

        write_counter(&mut out, "shelfd_jobs_started_total", "Total number of jobs started", self.jobs_started.get());
        write_counter(&mut out, "shelfd_jobs_succeeded_total", "Total number of jobs finished successfully", self.jobs_succeeded.get());
        write_counter(&mut out, "shelfd_jobs_failed_total", "Total number of crashed jobs", self.jobs_failed.get());
        write_histogram(&mut out, "shelfd_job_duration_seconds", "Job duration in seconds", &self.job_duration);

        write_counter(&mut out, "shelfd_searches_total", "Total number of searches", self.searches_total.get());
        write_counter(&mut out, "shelfd_searches_failed_total", "Total number of failed searches", self.searches_failed.get());

        write_counter(&mut out, "shelfd_chapters_fetched_total", "Total chapters fetched", self.chapters_fetched.get());
        write_counter(&mut out, "shelfd_chapters_repaired_total", "Total corrupted chapters deleted for re-fetch", self.chapters_repaired.get());
        write_counter(&mut out, "shelfd_images_fetched_total", "Total images fetched", self.images_fetched.get());
        write_counter(&mut out, "shelfd_images_failed_total", "Total image fetch failures", self.images_failed.get());

        write_counter(&mut out, "shelfd_updates_started_total", "Total update workflows started", self.updates_started.get());
        write_counter(&mut out, "shelfd_updates_without_changes_total", "Total updates that found no new chapters", self.updates_without_changes.get());
        write_counter(&mut out, "shelfd_snapshots_restored_total", "Total snapshots restored", self.snapshots_restored.get());

        for (name, help, value) in gauges {
            write_gauge(&mut out, name, help, *value);
        }

        out
    }
}

fn write_counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} counter", name);
    let _ = writeln!(out, "{} {}", name, value);
    let _ = writeln!(out);
}

fn write_gauge(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} gauge", name);
    let _ = writeln!(out, "{} {}", name, value);
    let _ = writeln!(out);
}

fn write_histogram(out: &mut String, name: &str, help: &str, hist: &Histogram) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} histogram", name);

    let mut cumulative: u64 = 0;
    for (i, &boundary) in hist.buckets.iter().enumerate() {
        cumulative += hist.counts[i].load(Ordering::Relaxed);
        let le_seconds = boundary as f64 / 1000.0;
        let _ = writeln!(out, "{}_bucket{{le=\"{}\"}} {}", name, le_seconds, cumulative);
    }
    let total_count = hist.count();
    let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", name, total_count);

    let sum_seconds = hist.sum.load(Ordering::Relaxed) as f64 / 1000.0;
    let _ = writeln!(out, "{}_sum {:.3}", name, sum_seconds);
    let _ = writeln!(out, "{}_count {}", name, total_count);
    let _ = writeln!(out);
}

/// Point-in-time snapshot of all metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub jobs_started: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub job_duration_mean_secs: f64,
    pub searches_total: u64,
    pub searches_failed: u64,
    pub chapters_fetched: u64,
    pub chapters_repaired: u64,
    pub images_fetched: u64,
    pub images_failed: u64,
    pub updates_started: u64,
    pub updates_without_changes: u64,
    pub snapshots_restored: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.inc();
        counter.add(4);
        assert_eq!(counter.get(), 5);
    }

    #[test]
    fn test_histogram_buckets() {
        let hist = Histogram::new_job_duration();
        hist.observe(Duration::from_millis(500));
        hist.observe(Duration::from_secs(10));
        hist.observe(Duration::from_secs(7200));
        assert_eq!(hist.count(), 3);
        assert_eq!(hist.counts[0].load(Ordering::Relaxed), 1);
        assert_eq!(hist.counts[2].load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prometheus_output() {
        let metrics = JobMetrics::new();
        metrics.jobs_started.add(3);
        metrics.record_finished(true, Duration::from_secs(2));
        metrics.record_finished(false, Duration::from_secs(2));

        let text = metrics.to_prometheus(&[("shelfd_active_jobs", "Jobs in progress", 1)]);
        assert!(text.contains("shelfd_jobs_started_total 3"));
        assert!(text.contains("shelfd_jobs_succeeded_total 1"));
        assert!(text.contains("shelfd_jobs_failed_total 1"));
        assert!(text.contains("# TYPE shelfd_job_duration_seconds histogram"));
        assert!(text.contains("shelfd_job_duration_seconds_bucket{le=\"+Inf\"} 2"));
        assert!(text.contains("# TYPE shelfd_active_jobs gauge"));
        assert!(text.contains("shelfd_active_jobs 1"));
    }
}
