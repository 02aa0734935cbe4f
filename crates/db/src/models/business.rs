//! Canonical business model.

use ledgerlift_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `businesses` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Business {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub email: Option<String>,
    pub business_type: Option<String>,
    pub tax_id: Option<String>,
    pub industry: Option<String>,
    pub extra: serde_json::Value,
    pub source_job_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBusiness {
    pub name: String,
    pub email: Option<String>,
    pub business_type: Option<String>,
    pub tax_id: Option<String>,
    pub industry: Option<String>,
    pub extra: Option<serde_json::Value>,
    pub source_job_id: Option<DbId>,
}
