//! Ledgerlift import pipeline.
//!
//! [`ImportPipeline`] runs a job through five ordered phases: extraction,
//! transformation with validation and scoring, duplicate detection, the
//! batched canonical import, and the ledger write. Persistence goes through
//! the [`ImportStore`] seam.

pub mod config;
pub mod connectors;
pub mod error;
pub mod orchestrator;
mod phases;
pub mod pool;
pub mod progress;
mod run;
pub mod store;

pub use config::PipelineConfig;
pub use error::{PipelineError, StoreError};
pub use orchestrator::ImportPipeline;
pub use progress::{ProgressCallback, ProgressReporter};
pub use store::{ImportStore, MemoryImportStore, PgImportStore};
