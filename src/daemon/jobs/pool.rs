//! Bounded per-job worker pool

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

/// Runs a job's background operations on the tokio runtime, at most `size`
/// at a time.
///
/// Shutting the pool down never waits: operations already running finish on
/// their own, operations still waiting for a permit are dropped.
#[derive(Debug)]
pub struct WorkerPool {
    name: String,
    size: usize,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        let size = size.max(1);
        Self {
            name: name.into(),
            size,
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Submit an operation. Returns `false` if the pool was shut down.
    pub fn submit<F>(&self, operation: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shut_down() {
            debug!("Pool {} is shut down, dropping operation", self.name);
            return false;
        }

        let permits = Arc::clone(&self.permits);
        let name = self.name.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                debug!("Pool {} shut down before operation started", name);
                return;
            };
            operation.await;
        });
        true
    }

    /// Stop accepting work without waiting for running operations
    pub fn shutdown(&self) {
        self.permits.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.permits.is_closed()
    }
}
