//! Postgres-backed tenant repository.
//!
//! Uniqueness is enforced by the schema: `tenants_pkey` on the id and the
//! partial index `tenants_active_domain_key` on active domains. A losing
//! concurrent insert surfaces as `StorageError::UniqueViolation`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use itsm_core::{StorageError, StorageResult, Tenant, TenantId, TenantRepository, TenantSettings, TenantStatus};

use crate::postgres::map_sqlx_error;

const SELECT_TENANT: &str = r#"
    SELECT tenant_id, name, description, admin_username, domain, settings, status, created_at, updated_at
    FROM tenants
"#;

#[derive(Debug, Clone)]
pub struct PostgresTenantRepository {
    pool: Arc<PgPool>,
}

impl PostgresTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl TenantRepository for PostgresTenantRepository {
    #[instrument(skip(self), fields(tenant_id = %id), err)]
    async fn find_by_id(&self, id: &TenantId) -> StorageResult<Option<Tenant>> {
        let row = sqlx::query(&format!("{SELECT_TENANT} WHERE tenant_id = $1"))
            .bind(id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_tenant_by_id", e))?;

        row.map(|r| decode(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_active_by_domain(&self, domain: &str) -> StorageResult<Option<Tenant>> {
        let row = sqlx::query(&format!(
            "{SELECT_TENANT} WHERE domain = $1 AND status = 'active'"
        ))
        .bind(domain)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_tenant_by_domain", e))?;

        row.map(|r| decode(&r)).transpose()
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id), err)]
    async fn insert(&self, tenant: &Tenant) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (
                tenant_id,
                name,
                description,
                admin_username,
                domain,
                settings,
                status,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(tenant.id.as_str())
        .bind(&tenant.name)
        .bind(&tenant.description)
        .bind(tenant.admin_username.as_deref())
        .bind(tenant.domain.as_deref())
        .bind(serde_json::Value::Object(tenant.settings.clone()))
        .bind(tenant.status.as_str())
        .bind(tenant.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_tenant", e))?;

        Ok(())
    }

    #[instrument(skip(self, settings), fields(tenant_id = %id), err)]
    async fn update_settings(
        &self,
        id: &TenantId,
        settings: &TenantSettings,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let result = sqlx::query("UPDATE tenants SET settings = $1, updated_at = $2 WHERE tenant_id = $3")
            .bind(serde_json::Value::Object(settings.clone()))
            .bind(updated_at)
            .bind(id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_tenant_settings", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(tenant_id = %id), err)]
    async fn set_status(
        &self,
        id: &TenantId,
        status: TenantStatus,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let result = sqlx::query("UPDATE tenants SET status = $1, updated_at = $2 WHERE tenant_id = $3")
            .bind(status.as_str())
            .bind(updated_at)
            .bind(id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_tenant_status", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> StorageResult<Vec<Tenant>> {
        let rows = sqlx::query(&format!("{SELECT_TENANT} ORDER BY created_at DESC, tenant_id ASC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_tenants", e))?;

        rows.iter().map(decode).collect()
    }
}

fn decode(row: &sqlx::postgres::PgRow) -> StorageResult<Tenant> {
    TenantRow::from_row(row)
        .map_err(|e| StorageError::backend(format!("failed to deserialize tenant row: {e}")))?
        .try_into()
}

// SQLx row types

#[derive(Debug)]
struct TenantRow {
    tenant_id: String,
    name: String,
    description: String,
    admin_username: Option<String>,
    domain: Option<String>,
    settings: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for TenantRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(TenantRow {
            tenant_id: row.try_get("tenant_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            admin_username: row.try_get("admin_username")?,
            domain: row.try_get("domain")?,
            settings: row.try_get("settings")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<TenantRow> for Tenant {
    type Error = StorageError;

    fn try_from(row: TenantRow) -> Result<Self, Self::Error> {
        let id = TenantId::parse(row.tenant_id)
            .map_err(|e| StorageError::backend(format!("stored tenant id is invalid: {e}")))?;
        let status = TenantStatus::parse(&row.status)
            .ok_or_else(|| StorageError::backend(format!("unknown tenant status '{}'", row.status)))?;
        let settings = match row.settings {
            serde_json::Value::Object(map) => map,
            _ => TenantSettings::new(),
        };

        Ok(Tenant {
            id,
            name: row.name,
            description: row.description,
            admin_username: row.admin_username,
            domain: row.domain,
            settings,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
