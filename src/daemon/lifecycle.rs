//! Daemon Lifecycle Management
//!
//! Handles daemon startup, shutdown, and single-instance guarantees.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::library::{Catalog, Library};
use crate::source::SourceRegistry;

use super::http::HttpServer;
use super::jobs::{JobManager, JobServices};

/// PID file for single-instance guarantee, kept in the library root
const PID_FILE_NAME: &str = "shelfd.pid";

/// How long servers get to stop before they are aborted
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Daemon instance owning the job manager and the HTTP server
pub struct Daemon {
    config: Config,
    manager: JobManager,
    shutdown_tx: broadcast::Sender<()>,
    pid_file_path: PathBuf,
}

impl Daemon {
    /// Start the daemon: lock the library, load the catalog, build sources
    pub async fn start(config: Config) -> Result<Self> {
        info!("Starting shelfd daemon");

        let root = config.library.root.clone();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create library root {}", root.display()))?;

        let pid_file_path = root.join(PID_FILE_NAME);
        Self::acquire_lock(&pid_file_path)?;

        match Self::build_manager(&config) {
            Ok(manager) => {
                let (shutdown_tx, _) = broadcast::channel(16);

                info!("Daemon initialized");
                info!("Library root: {}", root.display());

                Ok(Self {
                    config,
                    manager,
                    shutdown_tx,
                    pid_file_path,
                })
            }
            Err(e) => {
                let _ = Self::release_lock(&pid_file_path);
                Err(e)
            }
        }
    }

    fn build_manager(config: &Config) -> Result<JobManager> {
        let library = Library::new(&config.library.root);

        // Directory scan does blocking I/O, but only once at startup
        let catalog = Catalog::scan(&library).context("Failed to load catalog")?;

        let sources =
            SourceRegistry::from_config(&config.sources).context("Failed to build sources")?;
        info!(
            "Loaded {} sources ({} searchable)",
            sources.len(),
            sources.searchable_count()
        );
        if sources.is_empty() {
            warn!("No sources configured; every search and download will fail");
        }

        let services = JobServices::new(
            config.jobs.clone(),
            Arc::new(sources),
            library,
            Arc::new(catalog),
        );
        Ok(JobManager::new(services))
    }

    /// Run the daemon until Ctrl+C, SIGTERM or [`Daemon::trigger_shutdown`]
    pub async fn run(&self) -> Result<()> {
        info!("Daemon running");

        let shutdown_rx = self.shutdown_tx.subscribe();

        let http_config = self.config.http.clone();
        let shutdown_rx_http = self.shutdown_tx.subscribe();
        info!("Starting HTTP API server on: {}", http_config.listen_addr);

        let http_server = HttpServer::new(http_config, self.manager.clone());
        let http_handle = tokio::spawn(async move {
            match http_server.run(shutdown_rx_http).await {
                Ok(()) => info!("HTTP server shut down cleanly"),
                Err(e) => error!("HTTP server failed: {}", e),
            }
        });

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
            }
            _ = Self::wait_for_sigterm() => {
                info!("Received SIGTERM, shutting down");
            }
            _ = Self::wait_for_shutdown(shutdown_rx) => {
                info!("Shutdown requested");
            }
        }

        let _ = self.shutdown_tx.send(());

        let http_abort = http_handle.abort_handle();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, http_handle).await.is_err() {
            warn!("HTTP server did not shut down within 5s, aborting");
            http_abort.abort();
        }

        self.shutdown().await
    }

    /// Ask a running daemon to stop
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Release resources. Background jobs are dropped with the runtime.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down daemon");

        let stats = self.manager.stats();
        if stats.active_jobs > 0 {
            warn!("{} jobs still active at shutdown", stats.active_jobs);
        }

        Self::release_lock(&self.pid_file_path)?;

        info!("Daemon shutdown complete");
        Ok(())
    }

    pub fn manager(&self) -> &JobManager {
        &self.manager
    }

    /// Acquire single-instance lock via PID file
    ///
    /// Uses `create_new(true)` so two processes cannot both win the race.
    fn acquire_lock(pid_file_path: &Path) -> Result<()> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(pid_file_path)
        {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(e).context("Failed to create PID file");
            }
        }

        if let Some(pid) = read_pid(pid_file_path) {
            if Self::process_exists(pid) {
                anyhow::bail!(
                    "Daemon is already running (PID {}). Stop it first or remove {}",
                    pid,
                    pid_file_path.display()
                );
            }
        }

        // Stale PID file
        fs::remove_file(pid_file_path)?;

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(pid_file_path)
        {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(())
            }
            Err(e) => Err(e).context("Failed to create PID file after removing stale lock"),
        }
    }

    fn release_lock(pid_file_path: &Path) -> Result<()> {
        if pid_file_path.exists() {
            fs::remove_file(pid_file_path)?;
        }
        Ok(())
    }

    fn process_exists(pid: u32) -> bool {
        #[cfg(unix)]
        {
            // Signal 0 only checks for existence
            unsafe { libc::kill(pid as i32, 0) == 0 }
        }

        #[cfg(not(unix))]
        {
            let _ = pid;
            true
        }
    }

    #[cfg(unix)]
    async fn wait_for_sigterm() {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(unix))]
    async fn wait_for_sigterm() {
        std::future::pending::<()>().await
    }

    async fn wait_for_shutdown(mut rx: broadcast::Receiver<()>) {
        let _ = rx.recv().await;
    }
}

fn read_pid(pid_file_path: &Path) -> Option<u32> {
    let mut file = File::open(pid_file_path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

/// Check if a daemon is running for this library root
pub fn is_daemon_running(library_root: &Path) -> bool {
    get_daemon_pid(library_root).is_some()
}

/// PID of the daemon running for this library root, if any
pub fn get_daemon_pid(library_root: &Path) -> Option<u32> {
    read_pid(&library_root.join(PID_FILE_NAME)).filter(|&pid| Daemon::process_exists(pid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.library.root = root.to_path_buf();
        config.http.listen_addr = "127.0.0.1:0".to_string();
        config
    }

    #[test]
    fn test_pid_lock_acquire_release() {
        let temp_dir = TempDir::new().unwrap();
        let pid_path = temp_dir.path().join("test.pid");

        Daemon::acquire_lock(&pid_path).unwrap();
        assert!(pid_path.exists());
        assert_eq!(read_pid(&pid_path), Some(std::process::id()));

        Daemon::release_lock(&pid_path).unwrap();
        assert!(!pid_path.exists());
    }

    #[test]
    fn test_is_daemon_running() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!is_daemon_running(temp_dir.path()));
    }

    #[tokio::test]
    async fn test_second_daemon_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir.path().join("library"));

        let daemon = Daemon::start(config.clone()).await.unwrap();
        assert!(is_daemon_running(&config.library.root));
        assert!(Daemon::start(config.clone()).await.is_err());

        daemon.shutdown().await.unwrap();
        assert!(!is_daemon_running(&config.library.root));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_request() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path());

        let daemon = Arc::new(Daemon::start(config).await.unwrap());
        let runner = Arc::clone(&daemon);
        let handle = tokio::spawn(async move { runner.run().await });

        // Let the select loop subscribe before signalling
        tokio::time::sleep(Duration::from_millis(50)).await;
        daemon.trigger_shutdown();

        let result = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(!temp_dir.path().join(PID_FILE_NAME).exists());
    }
}
