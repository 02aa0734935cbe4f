//! Ledgerlift domain logic for legacy data migration.
//!
//! Everything here is pure: no database, no async, no I/O beyond parsing
//! byte buffers handed in by callers.
//!
//! - [`field_value`]: tagged legacy values and raw records.
//! - [`source_system`]: supported legacy systems and their source config.
//! - [`mapping`]: mapping sets, curated templates, and suggestions.
//! - [`transform`]: the per-field transformation engine.
//! - [`validation`]: rule evaluation and custom hooks.
//! - [`quality`]: per-record quality scoring.
//! - [`duplicate_detection`]: similarity strategies and the run index.
//! - [`import_job`]: job configuration, statuses, and run accounting.
//! - [`processing`]: the per-record pipeline and import decisions.
//! - [`analysis`]: pre-flight data-structure analysis.

pub mod analysis;
pub mod duplicate_detection;
pub mod entity;
pub mod error;
pub mod field_value;
pub mod hashing;
pub mod import_job;
pub mod mapping;
pub mod pagination;
pub mod parsing;
pub mod processing;
pub mod progress;
pub mod quality;
pub mod source_system;
pub mod transform;
pub mod types;
pub mod validation;
