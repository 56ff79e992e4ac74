//! Observability for worker pools.
//!
//! Each pool owns a Prometheus registry exposing its thread and queue
//! gauges and task lifecycle counters.
//!
//! ```rust,ignore
//! let pool = ThreadPool::with_limits(2, 8, 64)?;
//! println!("{}", pool.metrics().export());
//! ```

pub mod metrics;

pub use metrics::PoolMetrics;
