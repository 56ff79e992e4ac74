//! tidepool - a self-managed worker thread pool.
//!
//! A bounded task queue is serviced by a set of OS worker threads whose
//! population follows the load: a manager thread spawns workers while the
//! backlog outgrows them and retires idle ones when most sit unused.
//!
//! # Features
//!
//! - **Backpressure**: `submit` blocks while the queue is at capacity
//! - **Elastic sizing**: between `min_threads` and `max_threads`, in batches
//! - **Cooperative shrink**: idle workers retire themselves on request
//! - **Fault tolerant**: a panicking task costs one worker, which is replaced
//! - **Observability**: structured `tracing` logs and Prometheus metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use tidepool::{PoolConfig, ThreadPool};
//! use std::time::Duration;
//!
//! let config = PoolConfig::new(2, 8, 64)
//!     .with_name("resize")
//!     .with_scale_interval(Duration::from_secs(1));
//! let pool = ThreadPool::new(config)?;
//!
//! for image in images {
//!     pool.submit(|img: Image| img.thumbnail().save(), image)?;
//! }
//! pool.destroy();
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars), empty when built outside a git checkout
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

pub mod config;
pub mod logging;
pub mod observability;
pub mod pool;

// Re-exports for convenience
pub use config::{Config, PoolConfig};
pub use pool::{PoolError, PoolResult, PoolStats, ThreadPool};

/// Full version string: "0.1.0 (abc12345)", or just "0.1.0" without a hash.
pub fn version() -> String {
    if BUILD_VERSION.is_empty() {
        PKG_VERSION.to_string()
    } else {
        format!("{} ({})", PKG_VERSION, BUILD_VERSION)
    }
}
