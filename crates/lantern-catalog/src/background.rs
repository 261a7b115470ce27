//! Worker pool for background cache loads
//!
//! The pool is a dedicated multi-threaded tokio runtime owned by the cache.
//! Shutting it down abandons queued and running loads without waiting for
//! them; their futures are dropped, which releases any statement handles they
//! hold.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use lantern_core::Result;
use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};

/// Owned worker pool that runs background loads
pub struct BackgroundExecutor {
    name: String,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    shut_down: AtomicBool,
}

impl BackgroundExecutor {
    /// Start a pool of `worker_threads` threads named `{thread_name}-{n}`
    pub fn new(worker_threads: usize, thread_name: impl Into<String>) -> Result<Self> {
        let name = thread_name.into();
        let prefix = name.clone();
        let next_id = Arc::new(AtomicUsize::new(0));

        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name_fn(move || {
                let id = next_id.fetch_add(1, Ordering::SeqCst);
                format!("{}-{}", prefix, id)
            })
            .enable_all()
            .build()?;

        tracing::debug!(name = %name, worker_threads, "started background executor");

        Ok(Self {
            name,
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `future` on the pool.
    ///
    /// Returns false (and drops the future) once the pool has been shut down.
    pub fn spawn<F>(&self, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shut_down() {
            tracing::debug!(name = %self.name, "executor shut down, dropping task");
            return false;
        }
        self.handle.spawn(future);
        true
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stop the pool immediately. Idempotent.
    pub fn shutdown_now(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
        tracing::info!(name = %self.name, "background executor shut down");
    }
}

impl Drop for BackgroundExecutor {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}
