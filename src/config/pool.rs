//! Pool configuration.

use std::time::Duration;

use super::parse::{env_or, env_parse, env_required_duration};
use super::ConfigError;

/// Default manager period between scaling decisions.
pub const DEFAULT_SCALE_INTERVAL: Duration = Duration::from_secs(3);

/// Default number of workers added or retired per scaling decision.
pub const DEFAULT_SCALE_BATCH: usize = 2;

/// Worker pool configuration.
///
/// Built with [`PoolConfig::new`] and the `with_*` methods, or loaded from
/// the environment with [`PoolConfig::from_env`]. Ranges are checked when
/// the pool is created, not here.
///
/// # Environment Variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `POOL_NAME` | `tidepool` | Thread name prefix and metrics label |
/// | `POOL_MIN_THREADS` | `3` | Workers always kept alive |
/// | `POOL_MAX_THREADS` | `0` | Worker ceiling (0 = CPU count) |
/// | `POOL_QUEUE_CAPACITY` | `100` | Pending tasks before submit blocks |
/// | `POOL_SCALE_INTERVAL` | `3s` | Manager period |
/// | `POOL_SCALE_BATCH` | `2` | Workers added/retired per period |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Pool name, used for thread names and logging.
    pub name: String,
    /// Floor thread count.
    pub min_threads: usize,
    /// Ceiling thread count.
    pub max_threads: usize,
    /// Backpressure threshold for submission.
    pub queue_capacity: usize,
    /// Manager period.
    pub scale_interval: Duration,
    /// Workers spawned or retired per manager decision.
    pub scale_batch: usize,
}

impl PoolConfig {
    /// Create a configuration with default scaling parameters.
    pub fn new(min_threads: usize, max_threads: usize, queue_capacity: usize) -> Self {
        Self {
            name: "tidepool".to_string(),
            min_threads,
            max_threads,
            queue_capacity,
            scale_interval: DEFAULT_SCALE_INTERVAL,
            scale_batch: DEFAULT_SCALE_BATCH,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_scale_interval(mut self, interval: Duration) -> Self {
        self.scale_interval = interval;
        self
    }

    pub fn with_scale_batch(mut self, batch: usize) -> Self {
        self.scale_batch = batch;
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let min_threads = env_parse("POOL_MIN_THREADS", 3usize)?;
        let max_threads =
            Self::resolve_max_threads(env_parse("POOL_MAX_THREADS", 0usize)?, min_threads);
        let queue_capacity = env_parse("POOL_QUEUE_CAPACITY", 100usize)?;
        let scale_interval = env_required_duration("POOL_SCALE_INTERVAL", "3s")?;
        let scale_batch = env_parse("POOL_SCALE_BATCH", DEFAULT_SCALE_BATCH)?;

        if min_threads == 0 {
            return Err(ConfigError::Invalid {
                key: "POOL_MIN_THREADS".into(),
                message: "minimum thread count cannot be zero".into(),
            });
        }
        if queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "POOL_QUEUE_CAPACITY".into(),
                message: "queue capacity cannot be zero".into(),
            });
        }
        if scale_batch == 0 {
            return Err(ConfigError::Invalid {
                key: "POOL_SCALE_BATCH".into(),
                message: "scale batch cannot be zero".into(),
            });
        }

        Ok(Self {
            name: env_or("POOL_NAME", "tidepool"),
            min_threads,
            max_threads,
            queue_capacity,
            scale_interval,
            scale_batch,
        })
    }

    /// Resolve 0 to the CPU count, never going below the floor.
    fn resolve_max_threads(raw: usize, min_threads: usize) -> usize {
        if raw == 0 {
            num_cpus::get().max(min_threads)
        } else {
            raw
        }
    }
}
