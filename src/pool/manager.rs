//! Manager thread: resizes the worker population once per scaling period.
//!
//! The manager never stops a worker directly. It cannot tell which workers
//! are idle, so shrinking hands out kill credits and wakes that many
//! waiters; idle workers volunteer by consuming a credit.

use std::sync::{Arc, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::state::{PoolState, Shared};
use super::worker;

/// What the manager saw at the start of a decision.
#[derive(Debug, Clone, Copy)]
struct Snapshot {
    queued: usize,
    live: usize,
    working: usize,
}

/// Manager thread main loop.
pub(crate) fn run(shared: Arc<Shared>) {
    let period = shared.config.scale_interval;
    debug!(pool = %shared.name(), ?period, "manager started");

    loop {
        let state = shared.lock();

        // Sleep out the period; only shutdown cuts it short
        let state = wait_on_not_empty(&shared, state, period, |s| s.shutdown);

        // Nothing queued: wait (bounded) for work before deciding
        let mut state = wait_on_not_empty(&shared, state, period, |s| {
            s.shutdown || !s.queue.is_empty()
        });

        if state.shutdown {
            break;
        }

        let snapshot = Snapshot {
            queued: state.queue.len(),
            live: state.live,
            working: shared.working(),
        };
        shared
            .metrics
            .update_thread_metrics(snapshot.working, snapshot.live);
        shared
            .metrics
            .update_queue_metrics(snapshot.queued, shared.config.queue_capacity);

        restore_floor(&shared, &mut state);
        grow(&shared, &mut state, snapshot);
        shrink(&shared, &mut state, snapshot);

        let retired = std::mem::take(&mut state.retired);
        drop(state);
        reap(&shared, retired);
    }

    debug!(pool = %shared.name(), "manager stopped");
}

/// Wait on "queue non-empty" until `done` holds or `timeout` elapses.
///
/// A timeout too large to express as a deadline waits for `done` alone.
///
/// Workers wait on the same condition, so a submit's single notification
/// may land here. Whenever the manager wakes with work queued it passes a
/// notification on.
fn wait_on_not_empty<'a, F>(
    shared: &Shared,
    mut state: MutexGuard<'a, PoolState>,
    timeout: Duration,
    done: F,
) -> MutexGuard<'a, PoolState>
where
    F: Fn(&PoolState) -> bool,
{
    let deadline = Instant::now().checked_add(timeout);
    while !done(&state) {
        state = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                shared
                    .not_empty
                    .wait_timeout(state, deadline - now)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
            None => shared
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner),
        };
        if !state.queue.is_empty() {
            shared.not_empty.notify_one();
        }
    }
    state
}

/// Replace workers lost to panicking tasks.
fn restore_floor(shared: &Arc<Shared>, state: &mut PoolState) {
    let min = shared.config.min_threads;
    if state.live >= min {
        return;
    }

    let missing = min - state.live;
    warn!(
        pool = %shared.name(),
        live = state.live,
        min,
        "live threads below minimum, spawning replacements"
    );
    for _ in 0..missing {
        if let Err(e) = worker::spawn(shared, state) {
            warn!(pool = %shared.name(), error = %e, "failed to spawn replacement worker");
            break;
        }
    }
}

/// Spawn up to one batch when the backlog exceeds the live thread count.
fn grow(shared: &Arc<Shared>, state: &mut PoolState, snapshot: Snapshot) {
    let max = shared.config.max_threads;
    if !(snapshot.queued > snapshot.live && snapshot.live < max) {
        return;
    }

    let mut added = 0;
    while added < shared.config.scale_batch && state.live < max {
        match worker::spawn(shared, state) {
            Ok(_) => added += 1,
            Err(e) => {
                warn!(pool = %shared.name(), error = %e, "failed to spawn worker");
                break;
            }
        }
    }

    if added > 0 {
        info!(
            pool = %shared.name(),
            added,
            queued = snapshot.queued,
            live = state.live,
            "growing pool"
        );
    }
}

/// Hand out one batch of kill credits when fewer than half the live
/// workers are busy.
fn shrink(shared: &Shared, state: &mut PoolState, snapshot: Snapshot) {
    if !(snapshot.working * 2 < snapshot.live && snapshot.live > shared.config.min_threads) {
        return;
    }

    let batch = shared.config.scale_batch;
    state.pending_kill = batch;
    for _ in 0..batch {
        shared.not_empty.notify_one();
    }

    info!(
        pool = %shared.name(),
        credits = batch,
        working = snapshot.working,
        live = snapshot.live,
        "shrinking pool"
    );
}

/// Join workers that retired since the last period.
fn reap(shared: &Shared, retired: Vec<JoinHandle<()>>) {
    for handle in retired {
        if handle.join().is_err() {
            debug!(pool = %shared.name(), "reaped panicked worker");
        }
    }
}
