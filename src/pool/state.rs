//! State shared by the facade, the manager and every worker.
//!
//! Two independent lock domains:
//!
//! - the primary lock ([`Shared::lock`]) guards the task queue, the live
//!   thread count, pending kill credits, the shutdown flag and the thread
//!   registry. Both condition variables pair with it.
//! - the secondary lock guards only the working thread count, which every
//!   worker touches twice per task.
//!
//! When both are needed they are taken primary first, then secondary.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::config::PoolConfig;
use crate::observability::PoolMetrics;

use super::queue::TaskQueue;

/// Everything guarded by the primary lock.
pub(crate) struct PoolState {
    pub queue: TaskQueue,
    /// Workers spawned and not yet exited.
    pub live: usize,
    /// Outstanding shrink requests awaiting a volunteer.
    pub pending_kill: usize,
    pub shutdown: bool,
    /// One slot per possible worker. A slot is filled by whoever spawns the
    /// worker and emptied only by that worker (or by the final join).
    pub registry: Vec<Option<JoinHandle<()>>>,
    /// Handles of workers that emptied their own slot and are exiting.
    pub retired: Vec<JoinHandle<()>>,
}

impl PoolState {
    fn new(max_threads: usize, queue_capacity: usize) -> Self {
        Self {
            queue: TaskQueue::new(queue_capacity),
            live: 0,
            pending_kill: 0,
            shutdown: false,
            registry: (0..max_threads).map(|_| None).collect(),
            retired: Vec::new(),
        }
    }

    pub fn free_slot(&self) -> Option<usize> {
        self.registry.iter().position(Option::is_none)
    }

    /// Move the calling worker's own handle out of its slot.
    ///
    /// The slot may already be empty when the final join collected it first.
    pub fn retire(&mut self, slot: usize) {
        if let Some(handle) = self.registry[slot].take() {
            debug_assert_eq!(handle.thread().id(), thread::current().id());
            self.retired.push(handle);
        }
    }

    /// Take every handle still owned by the pool, registered or retired.
    pub fn drain_handles(&mut self) -> Vec<JoinHandle<()>> {
        let mut handles: Vec<_> = self.registry.iter_mut().filter_map(Option::take).collect();
        handles.append(&mut self.retired);
        handles
    }
}

/// Pool internals, reference-counted across the facade and all threads.
pub(crate) struct Shared {
    pub config: PoolConfig,
    state: Mutex<PoolState>,
    working: Mutex<usize>,
    /// Signalled when a task is queued, on shrink, and on shutdown.
    pub not_empty: Condvar,
    /// Signalled when a worker dequeues, and on shutdown.
    pub not_full: Condvar,
    pub metrics: PoolMetrics,
}

impl Shared {
    pub fn new(config: PoolConfig, metrics: PoolMetrics) -> Self {
        metrics.update_queue_metrics(0, config.queue_capacity);
        Self {
            state: Mutex::new(PoolState::new(config.max_threads, config.queue_capacity)),
            working: Mutex::new(0),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            metrics,
            config,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Acquire the primary lock.
    ///
    /// No task ever runs under this lock, so a poisoned guard still holds
    /// consistent counters and is taken over.
    pub fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_working(&self) -> MutexGuard<'_, usize> {
        self.working.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn working(&self) -> usize {
        *self.lock_working()
    }

    pub fn begin_work(&self) {
        *self.lock_working() += 1;
    }

    pub fn end_work(&self) {
        let mut working = self.lock_working();
        debug_assert!(*working > 0, "working count underflow");
        *working = working.saturating_sub(1);
    }

    /// Join every worker the pool still owns, skipping the calling thread.
    ///
    /// Loops because a worker may move its handle to `retired` while an
    /// earlier batch is being joined. The calling thread's own handle goes
    /// back to `retired` for a later caller to join.
    pub fn join_workers(&self) {
        let current = thread::current().id();
        let mut own = None;
        loop {
            let handles = self.lock().drain_handles();
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if handle.thread().id() == current {
                    own = Some(handle);
                    continue;
                }
                let name = handle.thread().name().unwrap_or("worker").to_string();
                if handle.join().is_err() {
                    tracing::debug!(pool = %self.name(), thread = %name, "joined panicked worker");
                }
            }
        }
        if let Some(handle) = own {
            self.lock().retired.push(handle);
        }
    }
}
