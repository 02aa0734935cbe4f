//! Ledgerlift import lifecycle events.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ImportEvent`]: the event envelope for import job transitions.
//! - [`EventLogger`]: background subscriber that writes every event to
//!   the tracing log.

pub mod bus;
pub mod logger;

pub use bus::{EventBus, ImportEvent};
pub use logger::EventLogger;
