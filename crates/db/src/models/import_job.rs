//! Import job model.

use ledgerlift_core::import_job::JobStatus;
use ledgerlift_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::{ImportJobStatusId, StatusId};

/// A row from the `import_jobs` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ImportJob {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub source_system: String,
    pub status_id: StatusId,
    /// Resolved `ImportJobConfig`.
    pub config: serde_json::Value,
    pub total_records: i64,
    pub processed_records: i64,
    pub successful_records: i64,
    pub failed_records: i64,
    pub errors: serde_json::Value,
    pub warnings: serde_json::Value,
    pub summary: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
    pub created_by: Option<DbId>,
    pub scheduled_start_at: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ImportJob {
    pub fn status(&self) -> Option<JobStatus> {
        ImportJobStatusId::from_id(self.status_id).map(JobStatus::from)
    }
}

/// DTO for creating a new import job. Jobs always start `pending`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateImportJob {
    pub tenant_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub source_system: String,
    pub config: serde_json::Value,
    pub metadata: Option<serde_json::Value>,
    pub created_by: Option<DbId>,
    pub scheduled_start_at: Option<Timestamp>,
}
