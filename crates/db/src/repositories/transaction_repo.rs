//! Repository for the `transactions` table.

use ledgerlift_core::types::DbId;
use sqlx::PgPool;

use crate::models::transaction::{CreateTransaction, Transaction};

const COLUMNS: &str = "id, tenant_id, transaction_date, amount_cents, description, reference, \
    category, counterparty, extra, source_job_id, created_at, updated_at";

pub struct TransactionRepo;

impl TransactionRepo {
    pub async fn create(
        pool: &PgPool,
        tenant_id: DbId,
        input: &CreateTransaction,
    ) -> Result<Transaction, sqlx::Error> {
        let extra = input.extra.clone().unwrap_or_else(|| serde_json::json!({}));
        let query = format!(
            "INSERT INTO transactions
                (tenant_id, transaction_date, amount_cents, description, reference,
                 category, counterparty, extra, source_job_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Transaction>(&query)
            .bind(tenant_id)
            .bind(input.transaction_date)
            .bind(input.amount_cents)
            .bind(&input.description)
            .bind(&input.reference)
            .bind(&input.category)
            .bind(&input.counterparty)
            .bind(&extra)
            .bind(input.source_job_id)
            .fetch_one(pool)
            .await
    }

    pub async fn update_from_import(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        input: &CreateTransaction,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        let query = format!(
            "UPDATE transactions SET
                transaction_date = $3,
                amount_cents = $4,
                description = COALESCE($5, description),
                reference = COALESCE($6, reference),
                category = COALESCE($7, category),
                counterparty = COALESCE($8, counterparty),
                extra = extra || COALESCE($9, '{{}}'::jsonb),
                source_job_id = COALESCE($10, source_job_id)
             WHERE id = $1 AND tenant_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Transaction>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(input.transaction_date)
            .bind(input.amount_cents)
            .bind(&input.description)
            .bind(&input.reference)
            .bind(&input.category)
            .bind(&input.counterparty)
            .bind(&input.extra)
            .bind(input.source_job_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_tenant(
        pool: &PgPool,
        tenant_id: DbId,
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM transactions WHERE tenant_id = $1 ORDER BY id");
        sqlx::query_as::<_, Transaction>(&query)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }
}
