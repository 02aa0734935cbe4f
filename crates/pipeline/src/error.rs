//! Error types for the import pipeline.

use ledgerlift_core::error::CoreError;
use ledgerlift_core::progress::Phase;
use ledgerlift_core::types::DbId;

/// Errors raised by an [`ImportStore`](crate::store::ImportStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The record cannot be expressed as a canonical entity.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Errors raised by the pipeline. Everything except record- and
/// write-level problems is job-fatal.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Source returned no records")]
    EmptySource,

    #[error("{phase} phase timed out after {secs}s")]
    Timeout { phase: Phase, secs: u64 },

    #[error("Import job was cancelled")]
    Cancelled,

    #[error("Import job {job_id} is {status}, expected pending")]
    InvalidState { job_id: DbId, status: String },

    #[error("Import job {job_id} not found")]
    NotFound { job_id: DbId },

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PipelineError {
    /// Map a configuration validation failure from the core crate.
    pub fn configuration(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) | CoreError::Parse(msg) => Self::Configuration(msg),
            other => Self::Core(other),
        }
    }
}
