//! Canonical transaction model. Amounts are stored in cents.

use chrono::NaiveDate;
use ledgerlift_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `transactions` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Transaction {
    pub id: DbId,
    pub tenant_id: DbId,
    pub transaction_date: NaiveDate,
    pub amount_cents: i64,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub category: Option<String>,
    pub counterparty: Option<String>,
    pub extra: serde_json::Value,
    pub source_job_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransaction {
    pub transaction_date: NaiveDate,
    pub amount_cents: i64,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub category: Option<String>,
    pub counterparty: Option<String>,
    pub extra: Option<serde_json::Value>,
    pub source_job_id: Option<DbId>,
}
