//! Self-scaling thread pool facade.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::observability::PoolMetrics;

use super::error::{PoolError, PoolResult};
use super::queue::Task;
use super::state::Shared;
use super::{manager, worker, PoolStats};

#[cfg(test)]
thread_local! {
    /// State of the last pool this thread tried to create.
    static LAST_CREATED: std::cell::RefCell<std::sync::Weak<Shared>> =
        std::cell::RefCell::new(std::sync::Weak::new());
}

/// A bounded task queue serviced by a self-sizing set of worker threads.
///
/// `min_threads` workers are spawned up front and always kept alive. A
/// manager thread checks the load once per scaling period, spawning workers
/// while the backlog outgrows them (up to `max_threads`) and retiring idle
/// ones when fewer than half are busy.
///
/// Submission blocks while the queue is full. Dropping the pool destroys it.
///
/// ```rust,ignore
/// let pool = ThreadPool::with_limits(2, 8, 64)?;
/// pool.submit(|path: PathBuf| compress(&path), PathBuf::from("big.log"))?;
/// pool.destroy();
/// ```
pub struct ThreadPool {
    shared: Arc<Shared>,
    /// Manager thread handle, taken on destroy.
    manager: Mutex<Option<JoinHandle<()>>>,
    /// Set once destroy has started.
    destroyed: AtomicBool,
    /// Set once the first destroy has joined everything it could.
    teardown: Mutex<bool>,
    torn_down: Condvar,
}

impl ThreadPool {
    /// Create a pool with default scaling period and batch size.
    pub fn with_limits(
        min_threads: usize,
        max_threads: usize,
        queue_capacity: usize,
    ) -> PoolResult<Self> {
        Self::new(PoolConfig::new(min_threads, max_threads, queue_capacity))
    }

    /// Create a pool, spawning its manager and `min_threads` workers.
    ///
    /// If any thread fails to spawn, everything already started is shut
    /// down and joined before the error is returned.
    pub fn new(config: PoolConfig) -> PoolResult<Self> {
        validate(&config)?;

        let metrics = PoolMetrics::new(&config.name).map_err(|e| PoolError::Init {
            reason: format!("metrics registry: {}", e),
        })?;
        let shared = Arc::new(Shared::new(config, metrics));
        #[cfg(test)]
        LAST_CREATED.with(|last| *last.borrow_mut() = Arc::downgrade(&shared));

        let manager = {
            let manager_shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(format!("{}-manager", shared.name()))
                .spawn(move || manager::run(manager_shared))
                .map_err(|e| PoolError::Init {
                    reason: format!("failed to spawn manager thread: {}", e),
                })?
        };

        let spawned = {
            let mut state = shared.lock();
            let result = (0..shared.config.min_threads)
                .try_for_each(|_| worker::spawn(&shared, &mut state).map(|_| ()));
            result
        };

        let pool = Self {
            shared,
            manager: Mutex::new(Some(manager)),
            destroyed: AtomicBool::new(false),
            teardown: Mutex::new(false),
            torn_down: Condvar::new(),
        };

        if let Err(e) = spawned {
            warn!(pool = %pool.name(), error = %e, "worker spawn failed, tearing down");
            pool.destroy();
            return Err(PoolError::Init {
                reason: format!("failed to spawn worker thread: {}", e),
            });
        }

        info!(
            pool = %pool.name(),
            min = pool.min_threads(),
            max = pool.max_threads(),
            capacity = pool.capacity(),
            "thread pool created"
        );

        Ok(pool)
    }

    /// Queue `callable(argument)` for execution.
    ///
    /// Blocks while the queue is full. The argument is owned by the pool
    /// from here on and dropped by the worker right after the callable
    /// returns.
    ///
    /// Returns [`PoolError::TaskDropped`] if the pool shuts down before the
    /// task could be queued; the task is discarded without running. Once
    /// queued, a task is not guaranteed to run either: [`destroy`] does not
    /// drain the queue.
    ///
    /// A panicking callable takes its worker down with it. The pool stays
    /// usable and the manager restores the minimum thread count.
    ///
    /// [`destroy`]: ThreadPool::destroy
    pub fn submit<F, A>(&self, callable: F, argument: A) -> PoolResult<()>
    where
        F: FnOnce(A) + Send + 'static,
        A: Send + 'static,
    {
        self.enqueue(Task::new(callable, argument))
    }

    /// Queue a closure that owns its data. See [`submit`](ThreadPool::submit).
    pub fn execute<F>(&self, f: F) -> PoolResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Task::from_fn(f))
    }

    fn enqueue(&self, task: Task) -> PoolResult<()> {
        let shared = &self.shared;
        let mut state = shared.lock();

        while state.queue.is_full() && !state.shutdown {
            state = shared
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if state.shutdown {
            drop(state);
            shared.metrics.tasks_dropped_total.inc();
            debug!(pool = %self.name(), "task dropped, pool is shutting down");
            return Err(PoolError::TaskDropped);
        }

        if state.queue.push(task).is_err() {
            unreachable!("queue has room after waiting on not_full");
        }
        shared.metrics.tasks_submitted_total.inc();
        shared.not_empty.notify_one();
        Ok(())
    }

    /// Workers currently running a task. Advisory snapshot.
    pub fn working_count(&self) -> usize {
        self.shared.working()
    }

    /// Workers currently alive, idle or busy. Advisory snapshot.
    pub fn live_count(&self) -> usize {
        self.shared.lock().live
    }

    /// Tasks waiting in the queue. Advisory snapshot.
    pub fn queued_count(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.config.queue_capacity
    }

    pub fn min_threads(&self) -> usize {
        self.shared.config.min_threads
    }

    pub fn max_threads(&self) -> usize {
        self.shared.config.max_threads
    }

    pub fn name(&self) -> &str {
        self.shared.name()
    }

    /// Snapshot of every counter, also pushed to the metrics gauges.
    pub fn stats(&self) -> PoolStats {
        let (live, queued, pending_kill, shutdown, working) = {
            let state = self.shared.lock();
            (
                state.live,
                state.queue.len(),
                state.pending_kill,
                state.shutdown,
                self.shared.working(),
            )
        };

        let metrics = &self.shared.metrics;
        metrics.update_thread_metrics(working, live);
        metrics.update_queue_metrics(queued, self.capacity());

        PoolStats {
            live,
            working,
            idle: live.saturating_sub(working),
            queued,
            capacity: self.capacity(),
            pending_kill,
            min_threads: self.min_threads(),
            max_threads: self.max_threads(),
            shutdown,
        }
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.shared.metrics
    }

    /// Shut the pool down and wait for every thread to exit.
    ///
    /// In-flight tasks run to completion; queued tasks are dropped without
    /// running and blocked submitters return [`PoolError::TaskDropped`].
    ///
    /// Any number of threads may call it. Each caller returns only once
    /// every worker and the manager have exited. The exception is a call
    /// from inside one of this pool's tasks: it returns without waiting for
    /// its own worker, which exits after the task returns and is joined by
    /// the next outside caller (or when the pool is dropped).
    pub fn destroy(&self) {
        let in_task = worker::is_current(&self.shared);

        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.tear_down();
            *self.lock_teardown() = true;
            self.torn_down.notify_all();
        }
        if in_task {
            return;
        }

        // Held while joining so concurrent callers leave one at a time
        let mut done = self.lock_teardown();
        while !*done {
            done = self
                .torn_down
                .wait(done)
                .unwrap_or_else(PoisonError::into_inner);
        }
        self.shared.join_workers();
    }

    fn lock_teardown(&self) -> MutexGuard<'_, bool> {
        self.teardown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tear_down(&self) {
        info!(pool = %self.name(), "shutting down thread pool");
        let shared = &self.shared;

        shared.lock().shutdown = true;
        shared.not_empty.notify_all();
        shared.not_full.notify_all();

        // The manager goes first so nothing spawns while workers are joined
        let manager = self
            .manager
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = manager {
            if handle.join().is_err() {
                warn!(pool = %self.name(), "manager thread panicked");
            }
        }

        shared.join_workers();

        // Arguments are dropped outside the lock, their destructors may
        // call back into the pool
        let drained = shared.lock().queue.drain();
        let dropped = drained.len();
        drop(drained);
        if dropped > 0 {
            shared.metrics.tasks_dropped_total.inc_by(dropped as u64);
            info!(pool = %self.name(), dropped, "discarded queued tasks");
        }

        let stats = self.stats();
        info!(
            pool = %self.name(),
            live = stats.live,
            working = stats.working,
            "thread pool destroyed"
        );
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.name())
            .field("min_threads", &self.min_threads())
            .field("max_threads", &self.max_threads())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

fn validate(config: &PoolConfig) -> PoolResult<()> {
    let invalid = |field: &'static str, message: &str| -> PoolResult<()> {
        Err(PoolError::InvalidConfig {
            field,
            message: message.to_string(),
        })
    };

    if config.min_threads == 0 {
        return invalid("min_threads", "must be greater than zero");
    }
    if config.min_threads > config.max_threads {
        return invalid("max_threads", "must be at least min_threads");
    }
    if config.queue_capacity == 0 {
        return invalid("queue_capacity", "must be greater than zero");
    }
    if config.scale_batch == 0 {
        return invalid("scale_batch", "must be greater than zero");
    }
    if config.scale_interval.is_zero() {
        return invalid("scale_interval", "must be non-zero");
    }
    if config.name.as_bytes().contains(&0) {
        return invalid("name", "must not contain null bytes");
    }
    Ok(())
}
