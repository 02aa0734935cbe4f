//! Canonical client model.

use ledgerlift_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `clients` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Client {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub client_type: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub extra: serde_json::Value,
    pub source_job_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating (or overwriting) a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateClient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub client_type: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub extra: Option<serde_json::Value>,
    pub source_job_id: Option<DbId>,
}
