//! Bounded work queue shared by every pipeline in the process.
//!
//! Stage calls are admitted through a fair semaphore, so at most
//! `max_concurrent` of them run at once and waiting submissions are served in
//! FIFO order. The bound is derived from the native worker pool size:
//!
//! ```text
//! max(pool_size - 1, 1)
//! ```
//!
//! leaving one worker free for native work that stages may trigger.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Worker pool size assumed when none is configured.
pub const DEFAULT_THREAD_POOL_SIZE: usize = 4;

/// Environment variable selecting the worker pool size.
pub const THREAD_POOL_SIZE_ENV: &str = "STAGECHAIN_THREAD_POOL_SIZE";

/// Native worker pool variable consulted when [`THREAD_POOL_SIZE_ENV`] is unset.
pub const NATIVE_THREAD_POOL_SIZE_ENV: &str = "UV_THREADPOOL_SIZE";

static GLOBAL_QUEUE: OnceLock<Arc<WorkQueue>> = OnceLock::new();

/// Concurrency bound for a worker pool of `pool_size` threads.
pub fn concurrency_bound(pool_size: Option<usize>) -> usize {
    let pool_size = pool_size.unwrap_or(DEFAULT_THREAD_POOL_SIZE);
    let bound = pool_size.saturating_sub(1);
    if bound == 0 {
        tracing::warn!(
            pool_size,
            "thread pool size leaves no free worker; running stages one at a time"
        );
        return 1;
    }
    bound
}

/// Read the worker pool size from the environment. Unparseable values are ignored.
pub fn thread_pool_size_from_env() -> Option<usize> {
    [THREAD_POOL_SIZE_ENV, NATIVE_THREAD_POOL_SIZE_ENV]
        .iter()
        .find_map(|key| {
            let raw = env::var(key).ok()?;
            match raw.trim().parse::<usize>() {
                Ok(size) => Some(size),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "ignoring invalid thread pool size");
                    None
                }
            }
        })
}

#[derive(Debug)]
pub struct WorkQueue {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl WorkQueue {
    /// Queue admitting up to `max_concurrent` tasks; zero is raised to one.
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue sized for a worker pool of `pool_size` threads.
    pub fn for_thread_pool_size(pool_size: Option<usize>) -> Self {
        Self::new(concurrency_bound(pool_size))
    }

    pub fn from_env() -> Self {
        Self::for_thread_pool_size(thread_pool_size_from_env())
    }

    /// Process-wide queue, built from the environment on first use.
    pub fn global() -> Arc<WorkQueue> {
        Arc::clone(GLOBAL_QUEUE.get_or_init(|| {
            let queue = WorkQueue::from_env();
            tracing::debug!(max_concurrent = queue.max_concurrent(), "work queue initialized");
            Arc::new(queue)
        }))
    }

    /// Run `task` once a slot is free. Its failure is returned to this caller only.
    pub async fn submit<F, T>(&self, task: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let _permit = self.acquire().await?;
        task.await
    }

    async fn acquire(&self) -> Result<QueuePermit<'_>, AppError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| {
                AppError::with_source(
                    ErrorCategory::InternalError,
                    "work queue closed",
                    Box::new(err),
                )
            })?;

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.update_peak(current);

        Ok(QueuePermit {
            _permit: permit,
            in_flight: &self.in_flight,
        })
    }

    fn update_peak(&self, current: usize) {
        let mut peak = self.peak_in_flight.load(Ordering::SeqCst);
        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously running tasks observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

struct QueuePermit<'a> {
    _permit: OwnedSemaphorePermit,
    in_flight: &'a AtomicUsize,
}

impl Drop for QueuePermit<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
