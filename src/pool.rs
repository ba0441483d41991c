//! Fixed-size worker pool with ordered, all-or-nothing dispatch.
//!
//! Workers are the named threads of a dedicated `rayon::ThreadPool`. The
//! coordinator awaits one `oneshot` per item, so results come back in input
//! order whatever order the workers finish in. Workers keep no state between
//! calls.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{BoxError, EngineError, Result, Stage};

/// Why a dispatched item produced no value.
#[derive(Debug)]
pub enum DispatchError<E> {
    /// The function returned an error for the item at `index`.
    Task { index: usize, error: E },
    /// The function panicked on the item at `index`.
    Panic { index: usize, message: String },
    /// The pool was shut down before or during the call.
    Closed,
}

impl DispatchError<BoxError> {
    /// Convert into an [`EngineError`] attributed to `stage`.
    pub fn into_engine_error(self, stage: Stage) -> EngineError {
        match self {
            DispatchError::Task { index, error } => EngineError::worker_failure(stage, index, error),
            DispatchError::Panic { index, message } => EngineError::WorkerPanicked {
                stage,
                index,
                message,
            },
            DispatchError::Closed => EngineError::PoolClosed,
        }
    }
}

/// Owns a fixed set of worker threads.
///
/// Construct one per run, pass it (usually as `Arc<WorkerPool>`) to every
/// stage, and call [`WorkerPool::shutdown`] when done, or let [`with_pool`]
/// do both. Dropping a pool that was never shut down stops it from taking
/// work but does not wait: its threads finish any queued jobs and exit on
/// their own, detached from the caller.
///
/// Only one `parallel_apply` per pool is expected to be in flight at a time.
pub struct WorkerPool {
    size: usize,
    threads: Mutex<Option<rayon::ThreadPool>>,
    /// One permit per worker thread that has exited.
    exited: Arc<Semaphore>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("open", &self.is_open())
            .finish()
    }
}

impl WorkerPool {
    /// Start `size` workers with the default thread name.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_config(&EngineConfig::default().with_workers(size))
    }

    /// Start a pool sized and named by `config`.
    pub fn with_config(config: &EngineConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(EngineError::InvalidPartitionCount {
                count: 0,
                workers: Some(0),
            });
        }

        let exited = Arc::new(Semaphore::new(0));
        let on_exit = Arc::clone(&exited);
        let prefix = config.thread_name.clone();
        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(move |id| format!("{prefix}-{id}"))
            .exit_handler(move |id| {
                debug!(worker = id, "Worker exiting");
                on_exit.add_permits(1);
            })
            .build()
            .map_err(EngineError::Spawn)?;

        info!(workers = config.workers, "Worker pool started");

        Ok(Self {
            size: config.workers,
            threads: Mutex::new(Some(threads)),
            exited,
        })
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the pool still accepts work.
    pub fn is_open(&self) -> bool {
        self.threads
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Apply `f` to every item across the workers, returning results in input order.
    ///
    /// Waits for every item. If any invocation fails, the lowest failing index
    /// is reported and all other results are discarded.
    pub async fn parallel_apply<T, R, F>(&self, items: Vec<T>, f: F) -> Result<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> std::result::Result<R, BoxError> + Send + Sync + 'static,
    {
        self.try_apply(items, f)
            .await
            .map_err(|e| e.into_engine_error(Stage::Apply))
    }

    /// Like [`parallel_apply`](Self::parallel_apply) but keeps the caller's error type.
    pub async fn try_apply<T, R, E, F>(
        &self,
        items: Vec<T>,
        f: F,
    ) -> std::result::Result<Vec<R>, DispatchError<E>>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> std::result::Result<R, E> + Send + Sync + 'static,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let total = items.len();
        let f = Arc::new(f);
        let mut receivers = Vec::with_capacity(total);
        {
            let guard = self.threads.lock().map_err(|_| DispatchError::Closed)?;
            let threads = guard.as_ref().ok_or(DispatchError::Closed)?;
            for item in items {
                let (tx, rx) = oneshot::channel();
                let f = Arc::clone(&f);
                threads.spawn(move || {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(item)));
                    // The coordinator may have gone away; nothing to report to then.
                    let _ = tx.send(outcome);
                });
                receivers.push(rx);
            }
        }

        debug!(items = total, workers = self.size, "Dispatched work items");

        let outcomes = join_all(receivers).await;

        let mut results = Vec::with_capacity(total);
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(Ok(Ok(value))) => results.push(value),
                Ok(Ok(Err(error))) => return Err(DispatchError::Task { index, error }),
                Ok(Err(payload)) => {
                    let message = panic_message(payload.as_ref());
                    error!(index, %message, "Worker panicked");
                    return Err(DispatchError::Panic { index, message });
                }
                // The job was dropped without running.
                Err(_) => return Err(DispatchError::Closed),
            }
        }

        Ok(results)
    }

    /// Stop accepting work and wait for every worker to exit.
    ///
    /// Queued and in-flight jobs finish first. Calling this more than once is
    /// a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        let threads = self
            .threads
            .lock()
            .map_err(|_| EngineError::PoolShutdown { failed: self.size })?
            .take();
        let Some(threads) = threads else {
            return Ok(());
        };
        // Dropping the rayon pool asks its threads to exit once idle.
        drop(threads);

        let expected = u32::try_from(self.size).unwrap_or(u32::MAX);
        let exited = self
            .exited
            .acquire_many(expected)
            .await
            .map_err(|_| EngineError::PoolShutdown { failed: self.size })?;
        exited.forget();

        info!(workers = self.size, "Worker pool shut down");
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.threads.lock() {
            if guard.take().is_some() {
                debug!("Worker pool dropped without shutdown; workers detached");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run `body` with a fresh pool and always shut the pool down afterwards.
///
/// A shutdown problem is logged; it never replaces the body's own result.
///
/// ```rust,no_run
/// use parallel_mapreduce::{with_pool, EngineConfig};
///
/// # async fn demo() -> parallel_mapreduce::Result<()> {
/// let doubled = with_pool(&EngineConfig::default().with_workers(2), |pool| async move {
///     pool.parallel_apply(vec![1, 2, 3], |x: i32| Ok(x * 2)).await
/// })
/// .await?;
/// assert_eq!(doubled, vec![2, 4, 6]);
/// # Ok(())
/// # }
/// ```
pub async fn with_pool<T, F, Fut>(config: &EngineConfig, body: F) -> Result<T>
where
    F: FnOnce(Arc<WorkerPool>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let pool = Arc::new(WorkerPool::with_config(config)?);
    let result = body(Arc::clone(&pool)).await;
    if let Err(e) = pool.shutdown().await {
        warn!(error = %e, "Worker pool shutdown failed");
    }
    result
}
