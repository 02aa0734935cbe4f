//! Pipeline configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::error::PipelineError;

/// Runtime knobs for job execution.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Blocking workers used for per-record transform/validate/score work.
    pub processing_workers: usize,
    /// Deadline for the source connector.
    pub extraction_timeout: Duration,
    /// Deadline for each phase after extraction.
    pub phase_timeout: Duration,
    /// Request timeout for HTTP export downloads.
    pub http_timeout: Duration,
    /// Cap on error and warning lines kept on a job.
    pub max_logged_messages: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            processing_workers: 4,
            extraction_timeout: Duration::from_secs(300),
            phase_timeout: Duration::from_secs(900),
            http_timeout: Duration::from_secs(60),
            max_logged_messages: 1000,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                            | Default |
    /// |------------------------------------|---------|
    /// | `PIPELINE_PROCESSING_WORKERS`      | `4`     |
    /// | `PIPELINE_EXTRACTION_TIMEOUT_SECS` | `300`   |
    /// | `PIPELINE_PHASE_TIMEOUT_SECS`      | `900`   |
    /// | `PIPELINE_HTTP_TIMEOUT_SECS`       | `60`    |
    /// | `PIPELINE_MAX_LOGGED_MESSAGES`     | `1000`  |
    pub fn from_env() -> Result<Self, PipelineError> {
        let processing_workers: usize = env_or("PIPELINE_PROCESSING_WORKERS", 4)?;
        if processing_workers == 0 {
            return Err(PipelineError::Configuration(
                "PIPELINE_PROCESSING_WORKERS must be at least 1".into(),
            ));
        }
        Ok(Self {
            processing_workers,
            extraction_timeout: Duration::from_secs(env_or("PIPELINE_EXTRACTION_TIMEOUT_SECS", 300)?),
            phase_timeout: Duration::from_secs(env_or("PIPELINE_PHASE_TIMEOUT_SECS", 900)?),
            http_timeout: Duration::from_secs(env_or("PIPELINE_HTTP_TIMEOUT_SECS", 60)?),
            max_logged_messages: env_or("PIPELINE_MAX_LOGGED_MESSAGES", 1000)?,
        })
    }
}

/// Read and parse an environment variable, falling back to `default` when
/// unset.
pub fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, PipelineError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PipelineError::Configuration(format!("{key} has an invalid value '{raw}'"))),
        Err(_) => Ok(default),
    }
}
