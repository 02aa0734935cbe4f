//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts

pub mod business;
pub mod client;
pub mod import_job;
pub mod import_record;
pub mod status;
pub mod transaction;
