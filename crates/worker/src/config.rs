//! Worker configuration loaded from environment variables.

use std::time::Duration;

use ledgerlift_pipeline::config::env_or;
use ledgerlift_pipeline::PipelineError;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Delay between polls for due jobs.
    pub poll_interval: Duration,
    /// Most jobs picked up per poll.
    pub jobs_per_poll: i64,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                     | Default    |
    /// |-----------------------------|------------|
    /// | `DATABASE_URL`              | (required) |
    /// | `DATABASE_MAX_CONNECTIONS`  | `10`       |
    /// | `WORKER_POLL_INTERVAL_SECS` | `5`        |
    /// | `WORKER_JOBS_PER_POLL`      | `10`       |
    pub fn from_env() -> Result<Self, PipelineError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| PipelineError::Configuration("DATABASE_URL must be set".into()))?;
        let poll_secs: u64 = env_or("WORKER_POLL_INTERVAL_SECS", 5)?;
        if poll_secs == 0 {
            return Err(PipelineError::Configuration(
                "WORKER_POLL_INTERVAL_SECS must be at least 1".into(),
            ));
        }
        Ok(Self {
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            poll_interval: Duration::from_secs(poll_secs),
            jobs_per_poll: env_or("WORKER_JOBS_PER_POLL", 10)?,
        })
    }
}
