//! Worker thread: wait for work, dequeue under the primary lock, run the
//! task outside it.
//!
//! A worker ends in one of three ways:
//!
//! - **retired**: woken with a kill credit while the pool is above its floor.
//!   It empties its own registry slot and returns.
//! - **shutdown**: observes the shutdown flag between tasks.
//! - **fault**: the task callable panics. [`ExitGuard`] keeps the counts
//!   sound and the manager spawns a replacement if the floor is breached.
//!
//! Every path decrements the live count under the primary lock before the
//! thread finishes, so a join always observes the updated bookkeeping.

use std::cell::Cell;
use std::io;
use std::sync::{Arc, PoisonError};
use std::thread;
use std::time::Instant;

use tracing::{debug, error, trace};

use super::state::{PoolState, Shared};

thread_local! {
    /// Address of the pool state this thread works for, 0 off-pool.
    static CURRENT_POOL: Cell<usize> = const { Cell::new(0) };
}

#[cfg(test)]
thread_local! {
    /// Worker spawns the calling thread may still perform before `spawn`
    /// starts failing. `None` disables the limit.
    pub(crate) static SPAWN_BUDGET: Cell<Option<usize>> = const { Cell::new(None) };
}

/// True when called from one of `shared`'s worker threads.
pub(crate) fn is_current(shared: &Arc<Shared>) -> bool {
    CURRENT_POOL.with(|p| p.get() == Arc::as_ptr(shared) as usize)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Retired,
    Shutdown,
}

/// Spawn a worker into the first free registry slot.
///
/// The caller holds the primary lock; the new thread blocks on it until the
/// caller releases, by which time its handle is in the registry.
pub(crate) fn spawn(shared: &Arc<Shared>, state: &mut PoolState) -> io::Result<usize> {
    #[cfg(test)]
    {
        let exhausted = SPAWN_BUDGET.with(|budget| match budget.get() {
            Some(0) => true,
            Some(n) => {
                budget.set(Some(n - 1));
                false
            }
            None => false,
        });
        if exhausted {
            return Err(io::Error::other("spawn budget exhausted"));
        }
    }

    let slot = state
        .free_slot()
        .ok_or_else(|| io::Error::other("no free worker slot"))?;

    let worker_shared = Arc::clone(shared);
    let handle = thread::Builder::new()
        .name(format!("{}-worker-{}", shared.name(), slot))
        .spawn(move || run(worker_shared, slot))?;

    state.registry[slot] = Some(handle);
    state.live += 1;
    debug_assert!(state.live <= shared.config.max_threads);
    shared.metrics.workers_spawned_total.inc();

    trace!(pool = %shared.name(), slot, live = state.live, "worker spawned");
    Ok(slot)
}

/// Worker thread main loop.
fn run(shared: Arc<Shared>, slot: usize) {
    CURRENT_POOL.with(|p| p.set(Arc::as_ptr(&shared) as usize));
    let mut guard = ExitGuard {
        shared: &shared,
        slot,
        task_started: None,
    };
    debug!(pool = %shared.name(), slot, "worker started");

    let exit = 'work: loop {
        let mut state = shared.lock();

        while state.queue.is_empty() && !state.shutdown {
            state = shared
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);

            // Every credit seen is consumed, even when the floor keeps this
            // worker alive, so stale shrink requests never pile up.
            if state.pending_kill > 0 {
                state.pending_kill -= 1;
                if state.live > shared.config.min_threads {
                    state.live -= 1;
                    if !state.queue.is_empty() {
                        // The wake may have been meant for a task
                        shared.not_empty.notify_one();
                    }
                    state.retire(slot);
                    break 'work Exit::Retired;
                }
            }
        }

        if state.shutdown {
            state.live -= 1;
            break 'work Exit::Shutdown;
        }

        let Some(task) = state.queue.pop() else {
            continue;
        };
        shared.not_full.notify_one();
        drop(state);

        guard.task_started = Some(Instant::now());
        shared.begin_work();
        task.run();
        shared.end_work();
        if let Some(started) = guard.task_started.take() {
            shared
                .metrics
                .record_task(started.elapsed().as_secs_f64(), false);
        }
    };

    drop(guard);
    if exit == Exit::Retired {
        shared.metrics.workers_retired_total.inc();
    }
    debug!(pool = %shared.name(), slot, reason = ?exit, "worker stopped");
}

/// Restores the pool's counters when a task panics and unwinds the worker.
struct ExitGuard<'a> {
    shared: &'a Shared,
    slot: usize,
    /// Set while a task is running.
    task_started: Option<Instant>,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }

        if let Some(started) = self.task_started.take() {
            self.shared.end_work();
            self.shared
                .metrics
                .record_task(started.elapsed().as_secs_f64(), true);
        }

        let mut state = self.shared.lock();
        state.live = state.live.saturating_sub(1);
        state.retire(self.slot);
        error!(
            pool = %self.shared.name(),
            slot = self.slot,
            live = state.live,
            "task panicked, worker lost"
        );
    }
}
