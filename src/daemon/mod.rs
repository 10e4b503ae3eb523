//! Daemon Module
//!
//! The long-running shelfd process. It owns the job registry, the novel
//! catalog and the source registry, and serves the polling HTTP API.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                      shelfd daemon                      │
//! │                                                         │
//! │  ┌──────────────┐      ┌────────────────────────────┐   │
//! │  │ HTTP API     │ ───▶ │ JobManager                 │   │
//! │  │ (axum)       │      │  ┌──────────┐ ┌─────────┐  │   │
//! │  └──────────────┘      │  │ Registry │ │Snapshots│  │   │
//! │                        │  └──────────┘ └─────────┘  │   │
//! │                        └─────────────┬──────────────┘   │
//! │                                      │                  │
//! │         ┌────────────────┐   ┌───────┴───────┐          │
//! │         │ SourceRegistry │   │ Library +     │          │
//! │         │ (adapters)     │   │ Catalog       │          │
//! │         └────────────────┘   └───────────────┘          │
//! └────────────────────────────────────────────────────────┘
//! ```

pub mod http;
pub mod jobs;
pub mod lifecycle;
pub mod metrics;

pub use http::HttpServer;
pub use jobs::{JobManager, JobServices};
pub use lifecycle::{get_daemon_pid, is_daemon_running, Daemon};
pub use metrics::{JobMetrics, MetricsSnapshot};
