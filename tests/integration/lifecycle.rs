//! Creation, execution and teardown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use crate::helpers::*;
use tidepool::ThreadPool;

/// Every submitted task runs exactly once
#[test]
fn test_every_task_runs_once() {
    let pool = fast_pool(2, 4, 8);
    let runs: Arc<Vec<AtomicUsize>> = Arc::new((0..200).map(|_| AtomicUsize::new(0)).collect());

    for i in 0..200usize {
        let runs = Arc::clone(&runs);
        pool.submit(
            move |idx: usize| {
                runs[idx].fetch_add(1, Ordering::SeqCst);
            },
            i,
        )
        .unwrap();
    }

    assert!(wait_until(TIMEOUT, || {
        runs.iter().map(|r| r.load(Ordering::SeqCst)).sum::<usize>() == 200
    }));
    assert!(runs.iter().all(|r| r.load(Ordering::SeqCst) == 1));
    assert_eq!(pool.metrics().tasks_submitted_total.get(), 200);
    assert!(wait_until(TIMEOUT, || {
        pool.metrics().tasks_completed_total.get() == 200
    }));
}

/// A single worker executes tasks in submission order
#[test]
fn test_fifo_with_single_worker() {
    let pool = quiet_pool(1, 1, 16);
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..50u32 {
        let order = Arc::clone(&order);
        pool.submit(move |n: u32| order.lock().unwrap().push(n), i)
            .unwrap();
    }

    assert!(wait_until(TIMEOUT, || order.lock().unwrap().len() == 50));
    assert_eq!(*order.lock().unwrap(), (0..50).collect::<Vec<_>>());
}

/// Concurrent submitters each keep their own relative order
#[test]
fn test_per_submitter_fifo() {
    let pool = Arc::new(quiet_pool(1, 1, 4));
    let order = Arc::new(Mutex::new(Vec::new()));

    let submitters: Vec<_> = (0..3u32)
        .map(|producer| {
            let pool = Arc::clone(&pool);
            let order = Arc::clone(&order);
            thread::spawn(move || {
                for seq in 0..40u32 {
                    let order = Arc::clone(&order);
                    pool.submit(
                        move |item: (u32, u32)| order.lock().unwrap().push(item),
                        (producer, seq),
                    )
                    .unwrap();
                }
            })
        })
        .collect();
    for s in submitters {
        s.join().unwrap();
    }

    assert!(wait_until(TIMEOUT, || order.lock().unwrap().len() == 120));
    let order = order.lock().unwrap();
    for producer in 0..3 {
        let seqs: Vec<u32> = order
            .iter()
            .filter(|(p, _)| *p == producer)
            .map(|(_, s)| *s)
            .collect();
        assert_eq!(seqs, (0..40).collect::<Vec<_>>());
    }
}

/// The argument is released right after the callable returns
#[test]
fn test_argument_released_after_execution() {
    let pool = quiet_pool(1, 2, 4);
    let payload = Arc::new(vec![1u8; 1024]);
    let done = Counter::new();

    let counter = done.clone();
    pool.submit(
        move |data: Arc<Vec<u8>>| {
            assert_eq!(data.len(), 1024);
            counter.inc();
        },
        Arc::clone(&payload),
    )
    .unwrap();

    assert!(wait_until(TIMEOUT, || done.get() == 1));
    assert!(wait_until(TIMEOUT, || Arc::strong_count(&payload) == 1));
}

/// Destroy joins every thread and is idempotent
#[test]
fn test_destroy_joins_and_is_idempotent() {
    let pool = fast_pool(2, 4, 4);
    let done = Counter::new();
    for _ in 0..8 {
        let counter = done.clone();
        pool.execute(move || {
            thread::sleep(Duration::from_millis(5));
            counter.inc();
        })
        .unwrap();
    }

    pool.destroy();
    let stats = pool.stats();
    assert!(stats.shutdown);
    assert_eq!(stats.live, 0);
    assert_eq!(stats.working, 0);
    assert_eq!(stats.queued, 0);

    // Second call is a no-op
    pool.destroy();
    assert_eq!(pool.live_count(), 0);
}

/// A task still queued at destroy is either run or dropped, never leaked
#[test]
fn test_destroy_with_queued_task() {
    let pool = quiet_pool(1, 1, 4);
    let gate = Gate::new();
    block_one_worker(&pool, &gate);

    let payload = Arc::new(());
    let ran = Counter::new();
    let counter = ran.clone();
    pool.submit(move |_p: Arc<()>| counter.inc(), Arc::clone(&payload))
        .unwrap();
    assert_eq!(pool.queued_count(), 1);

    let opener = {
        let gate = gate.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            gate.open();
        })
    };
    pool.destroy();
    opener.join().unwrap();

    assert!(ran.get() <= 1);
    assert_eq!(Arc::strong_count(&payload), 1);
    assert_eq!(pool.queued_count(), 0);
    assert_eq!(pool.live_count(), 0);
}

/// Destroying from inside a task does not deadlock on the calling worker
#[test]
fn test_destroy_from_inside_task() {
    let pool = Arc::new(quiet_pool(2, 2, 4));
    let (tx, rx) = mpsc::channel();

    let inner = Arc::clone(&pool);
    pool.execute(move || {
        inner.destroy();
        tx.send(()).unwrap();
    })
    .unwrap();

    rx.recv_timeout(TIMEOUT)
        .expect("destroy from a task never returned");
    assert!(pool.execute(|| {}).unwrap_err().is_dropped());

    // An outside call joins the worker that started the teardown
    pool.destroy();
    assert_eq!(pool.live_count(), 0);
    assert_eq!(pool.working_count(), 0);
}

/// A second destroy from another thread waits for the first to finish
#[test]
fn test_concurrent_destroy_waits_for_teardown() {
    let pool = Arc::new(quiet_pool(1, 1, 1));
    let gate = Gate::new();
    block_one_worker(&pool, &gate);

    let first = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.destroy())
    };
    assert!(wait_until(TIMEOUT, || pool.stats().shutdown));

    let opener = {
        let gate = gate.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            gate.open();
        })
    };
    pool.destroy();

    let stats = pool.stats();
    assert_eq!(stats.live, 0);
    assert_eq!(stats.working, 0);
    first.join().unwrap();
    opener.join().unwrap();
}

/// Reads the pool from its destructor
struct QueuedOnDrop {
    pool: Weak<ThreadPool>,
    seen: Arc<Mutex<Option<usize>>>,
}

impl Drop for QueuedOnDrop {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            *self.seen.lock().unwrap() = Some(pool.queued_count());
        }
    }
}

/// Arguments discarded by destroy may call back into the pool
#[test]
fn test_discarded_argument_drop_can_use_pool() {
    let pool = Arc::new(quiet_pool(1, 1, 4));
    let gate = Gate::new();
    block_one_worker(&pool, &gate);

    let seen = Arc::new(Mutex::new(None));
    let argument = QueuedOnDrop {
        pool: Arc::downgrade(&pool),
        seen: Arc::clone(&seen),
    };
    pool.submit(|_arg: QueuedOnDrop| {}, argument).unwrap();

    let opener = {
        let gate = gate.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            gate.open();
        })
    };
    pool.destroy();
    opener.join().unwrap();

    assert_eq!(*seen.lock().unwrap(), Some(0));
    assert_eq!(pool.metrics().tasks_dropped_total.get(), 1);
}

/// Dropping the pool tears it down
#[test]
fn test_drop_destroys_pool() {
    let done = Counter::new();
    {
        let pool = ThreadPool::with_limits(1, 2, 2).unwrap();
        let counter = done.clone();
        pool.execute(move || counter.inc()).unwrap();
        assert!(wait_until(TIMEOUT, || done.get() == 1));
    }
    assert_eq!(done.get(), 1);
}

/// Blocking submission driven from an async runtime, as the demo binary does
#[tokio::test]
async fn test_submit_from_async_context() {
    let pool = Arc::new(quiet_pool(2, 2, 2));
    let done = Counter::new();

    let producer = {
        let pool = Arc::clone(&pool);
        let done = done.clone();
        tokio::task::spawn_blocking(move || {
            for i in 0..20u64 {
                let counter = done.clone();
                pool.submit(move |_n: u64| counter.inc(), i).unwrap();
            }
        })
    };
    producer.await.unwrap();

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while done.get() < 20 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(done.get(), 20);

    let pool = Arc::clone(&pool);
    tokio::task::spawn_blocking(move || pool.destroy()).await.unwrap();
}
