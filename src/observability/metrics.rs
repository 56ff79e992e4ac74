//! Prometheus metrics for a worker pool.
//!
//! Gauges mirror the pool's counters (live/working threads, queue depth),
//! counters track task and worker lifecycle events, and a histogram records
//! how long task callables run.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

/// Metrics registry for one pool.
///
/// Every metric carries a constant `pool` label so several pools can be
/// exported side by side.
pub struct PoolMetrics {
    registry: Registry,

    // === Gauges ===
    /// Workers currently spawned (idle or busy)
    pub threads_live: IntGauge,

    /// Workers currently running a task
    pub threads_working: IntGauge,

    /// Tasks waiting in the queue
    pub queue_depth: IntGauge,

    /// Queue capacity (backpressure threshold)
    pub queue_capacity: IntGauge,

    // === Counters ===
    /// Tasks accepted into the queue
    pub tasks_submitted_total: IntCounter,

    /// Tasks whose callable returned
    pub tasks_completed_total: IntCounter,

    /// Tasks discarded because the pool was shutting down
    pub tasks_dropped_total: IntCounter,

    /// Tasks whose callable panicked
    pub tasks_panicked_total: IntCounter,

    /// Worker threads spawned (initial batch included)
    pub workers_spawned_total: IntCounter,

    /// Worker threads that retired on a shrink request
    pub workers_retired_total: IntCounter,

    // === Durations ===
    /// Task execution time in seconds
    pub task_duration_seconds: Histogram,
}

impl PoolMetrics {
    /// Create a registry with all pool metrics, labelled with `pool`.
    pub fn new(pool: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let task_buckets = vec![
            0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0,
        ];

        let gauge = |name: &str, help: &str| -> Result<IntGauge, prometheus::Error> {
            let g = IntGauge::with_opts(Opts::new(name, help).const_label("pool", pool))?;
            registry.register(Box::new(g.clone()))?;
            Ok(g)
        };
        let threads_live = gauge("tidepool_threads_live", "Worker threads alive")?;
        let threads_working = gauge("tidepool_threads_working", "Worker threads running a task")?;
        let queue_depth = gauge("tidepool_queue_depth", "Tasks waiting in the queue")?;
        let queue_capacity = gauge("tidepool_queue_capacity", "Task queue capacity")?;

        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let c = IntCounter::with_opts(Opts::new(name, help).const_label("pool", pool))?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };
        let tasks_submitted_total =
            counter("tidepool_tasks_submitted_total", "Tasks accepted into the queue")?;
        let tasks_completed_total =
            counter("tidepool_tasks_completed_total", "Tasks that ran to completion")?;
        let tasks_dropped_total =
            counter("tidepool_tasks_dropped_total", "Tasks discarded during shutdown")?;
        let tasks_panicked_total =
            counter("tidepool_tasks_panicked_total", "Tasks whose callable panicked")?;
        let workers_spawned_total =
            counter("tidepool_workers_spawned_total", "Worker threads spawned")?;
        let workers_retired_total =
            counter("tidepool_workers_retired_total", "Worker threads retired by shrink")?;

        let task_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "tidepool_task_duration_seconds",
                "Task execution time in seconds",
            )
            .const_label("pool", pool)
            .buckets(task_buckets),
        )?;
        registry.register(Box::new(task_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            threads_live,
            threads_working,
            queue_depth,
            queue_capacity,
            tasks_submitted_total,
            tasks_completed_total,
            tasks_dropped_total,
            tasks_panicked_total,
            workers_spawned_total,
            workers_retired_total,
            task_duration_seconds,
        })
    }

    /// Update queue gauges.
    pub fn update_queue_metrics(&self, depth: usize, capacity: usize) {
        self.queue_depth.set(depth as i64);
        self.queue_capacity.set(capacity as i64);
    }

    /// Update thread gauges.
    pub fn update_thread_metrics(&self, working: usize, live: usize) {
        self.threads_working.set(working as i64);
        self.threads_live.set(live as i64);
    }

    /// Record one finished task.
    pub fn record_task(&self, duration_secs: f64, panicked: bool) {
        self.task_duration_seconds.observe(duration_secs);
        if panicked {
            self.tasks_panicked_total.inc();
        } else {
            self.tasks_completed_total.inc();
        }
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode pool metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
