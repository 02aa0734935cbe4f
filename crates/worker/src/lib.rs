//! Background execution of due import jobs.
//!
//! - [`config`]: worker settings read from the environment.
//! - [`poller`]: the polling loop that picks up `pending` jobs.

pub mod config;
pub mod poller;

pub use config::WorkerConfig;
pub use poller::{JobPoller, PollSummary};
