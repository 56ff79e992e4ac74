//! Panicking tasks and pool bookkeeping around them.

use std::sync::Arc;

use crate::helpers::*;

/// A panicking task costs one worker, which the manager replaces
#[test]
fn test_panicking_task_worker_replaced() {
    let pool = fast_pool(2, 2, 4);
    let spawned_before = pool.metrics().workers_spawned_total.get();

    pool.execute(|| panic!("task failure")).unwrap();

    assert!(wait_until(TIMEOUT, || pool.metrics().tasks_panicked_total.get() == 1));
    assert!(wait_until(TIMEOUT, || {
        pool.metrics().workers_spawned_total.get() == spawned_before + 1
    }));
    assert!(wait_until(TIMEOUT, || pool.live_count() == 2));
    assert_eq!(pool.working_count(), 0);

    // Still usable afterwards
    let done = Counter::new();
    for _ in 0..10 {
        let counter = done.clone();
        pool.execute(move || counter.inc()).unwrap();
    }
    assert!(wait_until(TIMEOUT, || {
        pool.metrics().tasks_completed_total.get() == 10
    }));
    assert_eq!(done.get(), 10);
}

/// The argument of a panicking task is still released
#[test]
fn test_panicking_task_releases_argument() {
    let pool = fast_pool(1, 1, 2);
    let payload = Arc::new(String::from("payload"));

    pool.submit(
        |s: Arc<String>| {
            if s.len() > 1 {
                panic!("rejecting {}", s);
            }
        },
        Arc::clone(&payload),
    )
    .unwrap();

    assert!(wait_until(TIMEOUT, || Arc::strong_count(&payload) == 1));
    assert!(wait_until(TIMEOUT, || pool.live_count() == 1));
}

/// Destroy after a fault joins the replacement as well
#[test]
fn test_destroy_after_fault() {
    let pool = fast_pool(1, 2, 2);
    pool.execute(|| panic!("task failure")).unwrap();
    assert!(wait_until(TIMEOUT, || pool.metrics().tasks_panicked_total.get() == 1));
    assert!(wait_until(TIMEOUT, || pool.live_count() == 1));

    pool.destroy();
    let stats = pool.stats();
    assert_eq!(stats.live, 0);
    assert_eq!(stats.working, 0);
}

/// Completed, panicked and dropped counters add up to what was submitted.
/// Workers lost along the way are replaced so the backlog still drains.
#[test]
fn test_task_counters_add_up() {
    let pool = fast_pool(2, 2, 16);
    let done = Counter::new();

    for i in 0..12u32 {
        let counter = done.clone();
        pool.submit(
            move |n: u32| {
                if n % 4 == 3 {
                    panic!("task {} failed", n);
                }
                counter.inc();
            },
            i,
        )
        .unwrap();
    }

    let metrics = pool.metrics();
    assert!(wait_until(TIMEOUT, || {
        metrics.tasks_completed_total.get() + metrics.tasks_panicked_total.get() == 12
    }));
    pool.destroy();

    let completed = metrics.tasks_completed_total.get();
    let panicked = metrics.tasks_panicked_total.get();
    let dropped = metrics.tasks_dropped_total.get();
    assert_eq!(metrics.tasks_submitted_total.get(), 12);
    assert_eq!(panicked, 3);
    assert_eq!(completed + panicked + dropped, 12);
    assert_eq!(completed as usize, done.get());
    assert_eq!(metrics.task_duration_seconds.get_sample_count(), completed + panicked);
}
