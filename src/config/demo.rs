//! Demo workload configuration.

use std::time::Duration;

use super::parse::{env_duration, env_parse, env_required_duration};
use super::ConfigError;

/// Settings for the bundled demo binary.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `DEMO_TASKS` | `100` | Number of tasks submitted |
/// | `DEMO_TASK_DURATION` | `1s` | Sleep inside each task ("off" for none) |
/// | `DEMO_RUN_FOR` | `30s` | Time given to the pool before it is destroyed |
#[derive(Clone, Debug)]
pub struct DemoConfig {
    pub tasks: u64,
    pub task_duration: Option<Duration>,
    pub run_for: Duration,
}

impl DemoConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            tasks: env_parse("DEMO_TASKS", 100u64)?,
            task_duration: env_duration("DEMO_TASK_DURATION", "1s")?,
            run_for: env_required_duration("DEMO_RUN_FOR", "30s")?,
        })
    }
}
