//! Test helpers and utilities

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tidepool::{PoolConfig, ThreadPool};

/// Manager period used by pools that are expected to rescale during a test.
pub const FAST_SCALE: Duration = Duration::from_millis(50);

/// Generous upper bound for anything a test waits on.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Pool with a short scaling period and batch size 2.
pub fn fast_pool(min: usize, max: usize, capacity: usize) -> ThreadPool {
    let config = PoolConfig::new(min, max, capacity)
        .with_name(format!("test-{}-{}-{}", min, max, capacity))
        .with_scale_interval(FAST_SCALE)
        .with_scale_batch(2);
    ThreadPool::new(config).expect("Failed to create pool")
}

/// Pool whose manager will not act within a typical test.
pub fn quiet_pool(min: usize, max: usize, capacity: usize) -> ThreadPool {
    let config = PoolConfig::new(min, max, capacity).with_scale_interval(Duration::from_secs(60));
    ThreadPool::new(config).expect("Failed to create pool")
}

/// Poll `cond` every few milliseconds until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// One-shot latch: tasks block in `wait` until `open` is called.
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

#[allow(dead_code)]
impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cvar.wait(open).unwrap();
        }
    }
}

/// Shared completion counter.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

#[allow(dead_code)]
impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Occupy one worker until `gate` opens, returning once the task is running.
#[allow(dead_code)]
pub fn block_one_worker(pool: &ThreadPool, gate: &Gate) {
    let busy_before = pool.working_count();
    let task_gate = gate.clone();
    pool.execute(move || task_gate.wait())
        .expect("Failed to submit blocking task");
    assert!(
        wait_until(TIMEOUT, || pool.working_count() > busy_before),
        "blocking task never started"
    );
}
