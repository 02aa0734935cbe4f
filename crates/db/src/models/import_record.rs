//! Import ledger entry model.

use ledgerlift_core::import_job::RecordStatus;
use ledgerlift_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::{ImportRecordStatusId, StatusId};

/// A row from the append-only `import_records` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ImportRecord {
    pub id: DbId,
    pub tenant_id: DbId,
    pub job_id: DbId,
    pub source_row_id: String,
    pub entity_type: Option<String>,
    pub status_id: StatusId,
    pub original_data: serde_json::Value,
    pub transformed_data: serde_json::Value,
    pub quality_score: Option<f64>,
    pub validation_errors: serde_json::Value,
    pub validation_warnings: serde_json::Value,
    pub is_duplicate: bool,
    pub duplicate_of: Option<serde_json::Value>,
    pub canonical_id: Option<DbId>,
    pub reason: Option<String>,
    pub processed_at: Timestamp,
    pub created_at: Timestamp,
}

impl ImportRecord {
    pub fn status(&self) -> Option<RecordStatus> {
        ImportRecordStatusId::from_id(self.status_id).map(RecordStatus::from)
    }
}

/// DTO for appending a ledger entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateImportRecord {
    pub tenant_id: DbId,
    pub job_id: DbId,
    pub source_row_id: String,
    pub entity_type: Option<String>,
    pub status_id: StatusId,
    pub original_data: serde_json::Value,
    pub transformed_data: serde_json::Value,
    pub quality_score: Option<f64>,
    pub validation_errors: serde_json::Value,
    pub validation_warnings: serde_json::Value,
    pub is_duplicate: bool,
    pub duplicate_of: Option<serde_json::Value>,
    pub canonical_id: Option<DbId>,
    pub reason: Option<String>,
}

/// Ledger entry count for one status.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}
