//! Repository for the `clients` table.

use ledgerlift_core::types::DbId;
use sqlx::PgPool;

use crate::models::client::{Client, CreateClient};

const COLUMNS: &str = "id, tenant_id, name, email, phone, client_type, tax_id, address, \
    extra, source_job_id, created_at, updated_at";

pub struct ClientRepo;

impl ClientRepo {
    pub async fn create(
        pool: &PgPool,
        tenant_id: DbId,
        input: &CreateClient,
    ) -> Result<Client, sqlx::Error> {
        let extra = input.extra.clone().unwrap_or_else(|| serde_json::json!({}));
        let query = format!(
            "INSERT INTO clients
                (tenant_id, name, email, phone, client_type, tax_id, address, extra, source_job_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Client>(&query)
            .bind(tenant_id)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.client_type)
            .bind(&input.tax_id)
            .bind(&input.address)
            .bind(&extra)
            .bind(input.source_job_id)
            .fetch_one(pool)
            .await
    }

    /// Overwrite an existing client with imported values. Absent optional
    /// values keep what is stored; `extra` keys are merged.
    pub async fn update_from_import(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        input: &CreateClient,
    ) -> Result<Option<Client>, sqlx::Error> {
        let query = format!(
            "UPDATE clients SET
                name = $3,
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                client_type = COALESCE($6, client_type),
                tax_id = COALESCE($7, tax_id),
                address = COALESCE($8, address),
                extra = extra || COALESCE($9, '{{}}'::jsonb),
                source_job_id = COALESCE($10, source_job_id)
             WHERE id = $1 AND tenant_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Client>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.client_type)
            .bind(&input.tax_id)
            .bind(&input.address)
            .bind(&input.extra)
            .bind(input.source_job_id)
            .fetch_optional(pool)
            .await
    }

    /// Every client of a tenant, for duplicate matching.
    pub async fn list_by_tenant(pool: &PgPool, tenant_id: DbId) -> Result<Vec<Client>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM clients WHERE tenant_id = $1 ORDER BY id");
        sqlx::query_as::<_, Client>(&query)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }
}
