//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod business_repo;
pub mod client_repo;
pub mod import_job_repo;
pub mod import_record_repo;
pub mod transaction_repo;

pub use business_repo::BusinessRepo;
pub use client_repo::ClientRepo;
pub use import_job_repo::ImportJobRepo;
pub use import_record_repo::ImportRecordRepo;
pub use transaction_repo::TransactionRepo;
