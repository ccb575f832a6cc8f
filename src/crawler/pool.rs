//! The shared worker pool every crawl task runs on

use crate::CrawlerError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// A dedicated multi-thread runtime shared by all sources
///
/// Tokio's scheduler steals work between its worker threads, so a task forked
/// by one source may be picked up by any idle worker.
pub struct WorkerPool {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    threads: usize,
    shut_down: AtomicBool,
}

impl WorkerPool {
    /// Starts a pool with `threads` worker threads (at least one)
    pub fn new(threads: usize) -> Result<Self, CrawlerError> {
        let threads = threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name("crawl-worker")
            .enable_all()
            .build()
            .map_err(CrawlerError::WorkerPool)?;

        tracing::debug!("Started worker pool with {} threads", threads);

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            threads,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Runs `future` on the pool
    ///
    /// Fails with [`CrawlerError::PoolShutdown`] once the pool has been shut down.
    pub fn spawn<F>(&self, future: F) -> Result<JoinHandle<F::Output>, CrawlerError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.is_shut_down() {
            return Err(CrawlerError::PoolShutdown);
        }
        Ok(self.handle.spawn(future))
    }

    /// Stops the pool without waiting
    ///
    /// Queued tasks never start and running tasks are dropped at their next
    /// await point; their join handles resolve as cancelled. Later calls are
    /// no-ops.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(runtime) = runtime {
            tracing::warn!("Shutting down worker pool");
            runtime.shutdown_background();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let runtime = self
            .runtime
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        // Dropping a runtime blocks, which panics inside async code
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
