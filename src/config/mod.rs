//! Configuration module for tidepool.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use tidepool::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Threads: {}..={}", config.pool.min_threads, config.pool.max_threads);
//! ```

mod demo;
mod error;
mod logging;
mod parse;
mod pool;

pub use demo::DemoConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
pub use pool::{PoolConfig, DEFAULT_SCALE_BATCH, DEFAULT_SCALE_INTERVAL};

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Worker pool configuration.
    pub pool: PoolConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Demo workload configuration.
    pub demo: DemoConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            pool: PoolConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            demo: DemoConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Pool: {}", self.pool.name);
        info!(
            "  Threads: min {} / max {}",
            self.pool.min_threads, self.pool.max_threads
        );
        info!("  Queue capacity: {}", self.pool.queue_capacity);
        info!(
            "  Scaling: every {:?}, batch {}",
            self.pool.scale_interval, self.pool.scale_batch
        );
        info!("  Log format: {:?}", self.logging.format);
        info!(
            "  Demo: {} tasks, {:?} each, run for {:?}",
            self.demo.tasks, self.demo.task_duration, self.demo.run_for
        );
    }
}
