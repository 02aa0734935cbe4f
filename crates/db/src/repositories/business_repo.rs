//! Repository for the `businesses` table.

use ledgerlift_core::types::DbId;
use sqlx::PgPool;

use crate::models::business::{Business, CreateBusiness};

const COLUMNS: &str = "id, tenant_id, name, email, business_type, tax_id, industry, \
    extra, source_job_id, created_at, updated_at";

pub struct BusinessRepo;

impl BusinessRepo {
    pub async fn create(
        pool: &PgPool,
        tenant_id: DbId,
        input: &CreateBusiness,
    ) -> Result<Business, sqlx::Error> {
        let extra = input.extra.clone().unwrap_or_else(|| serde_json::json!({}));
        let query = format!(
            "INSERT INTO businesses
                (tenant_id, name, email, business_type, tax_id, industry, extra, source_job_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Business>(&query)
            .bind(tenant_id)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.business_type)
            .bind(&input.tax_id)
            .bind(&input.industry)
            .bind(&extra)
            .bind(input.source_job_id)
            .fetch_one(pool)
            .await
    }

    pub async fn update_from_import(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        input: &CreateBusiness,
    ) -> Result<Option<Business>, sqlx::Error> {
        let query = format!(
            "UPDATE businesses SET
                name = $3,
                email = COALESCE($4, email),
                business_type = COALESCE($5, business_type),
                tax_id = COALESCE($6, tax_id),
                industry = COALESCE($7, industry),
                extra = extra || COALESCE($8, '{{}}'::jsonb),
                source_job_id = COALESCE($9, source_job_id)
             WHERE id = $1 AND tenant_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Business>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.business_type)
            .bind(&input.tax_id)
            .bind(&input.industry)
            .bind(&input.extra)
            .bind(input.source_job_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_tenant(pool: &PgPool, tenant_id: DbId) -> Result<Vec<Business>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM businesses WHERE tenant_id = $1 ORDER BY id");
        sqlx::query_as::<_, Business>(&query)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }
}
