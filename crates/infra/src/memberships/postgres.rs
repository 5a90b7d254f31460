//! Postgres-backed role assignments.
//!
//! `global_roles` is keyed by username and `tenant_roles` by
//! `(username, tenant_id)`, so upserts keep at most one role per context.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use itsm_core::{Membership, MembershipRepository, StorageError, StorageResult, TenantId};

use crate::postgres::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresMembershipRepository {
    pool: Arc<PgPool>,
}

impl PostgresMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl MembershipRepository for PostgresMembershipRepository {
    #[instrument(skip(self), err)]
    async fn global_role(&self, username: &str) -> StorageResult<Option<String>> {
        let row = sqlx::query("SELECT role FROM global_roles WHERE username = $1")
            .bind(username)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("global_role", e))?;

        row.map(|r| r.try_get::<String, _>("role"))
            .transpose()
            .map_err(|e| map_sqlx_error("global_role", e))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn tenant_roles(&self, username: &str, tenant_id: &TenantId) -> StorageResult<Vec<String>> {
        let rows = sqlx::query("SELECT role FROM tenant_roles WHERE username = $1 AND tenant_id = $2")
            .bind(username)
            .bind(tenant_id.as_str())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("tenant_roles", e))?;

        rows.iter()
            .map(|r| r.try_get::<String, _>("role"))
            .collect::<Result<_, _>>()
            .map_err(|e| map_sqlx_error("tenant_roles", e))
    }

    #[instrument(skip(self), err)]
    async fn set_global_role(&self, username: &str, role: &str) -> StorageResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO global_roles (username, role, assigned_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (username)
            DO UPDATE SET role = EXCLUDED.role, assigned_at = EXCLUDED.assigned_at
            "#,
        )
        .bind(username)
        .bind(role)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_global_role", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn clear_global_role(&self, username: &str, role: &str) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM global_roles WHERE username = $1 AND role = $2")
            .bind(username)
            .bind(role)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("clear_global_role", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn put_tenant_role(
        &self,
        username: &str,
        tenant_id: &TenantId,
        role: &str,
    ) -> StorageResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO tenant_roles (username, tenant_id, role, assigned_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (username, tenant_id)
            DO UPDATE SET role = EXCLUDED.role, assigned_at = EXCLUDED.assigned_at
            "#,
        )
        .bind(username)
        .bind(tenant_id.as_str())
        .bind(role)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("put_tenant_role", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete_tenant_role(
        &self,
        username: &str,
        tenant_id: &TenantId,
        role: &str,
    ) -> StorageResult<u64> {
        let result = sqlx::query(
            "DELETE FROM tenant_roles WHERE username = $1 AND tenant_id = $2 AND role = $3",
        )
        .bind(username)
        .bind(tenant_id.as_str())
        .bind(role)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_tenant_role", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn tenant_members(&self, tenant_id: &TenantId) -> StorageResult<Vec<Membership>> {
        let rows = sqlx::query(
            r#"
            SELECT username, role, tenant_id, assigned_at
            FROM tenant_roles
            WHERE tenant_id = $1
            ORDER BY username ASC
            "#,
        )
        .bind(tenant_id.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("tenant_members", e))?;

        rows.iter().map(decode).collect()
    }

    #[instrument(skip(self), err)]
    async fn user_tenants(&self, username: &str) -> StorageResult<Vec<Membership>> {
        let rows = sqlx::query(
            r#"
            SELECT username, role, tenant_id, assigned_at
            FROM tenant_roles
            WHERE username = $1
            ORDER BY tenant_id ASC
            "#,
        )
        .bind(username)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("user_tenants", e))?;

        rows.iter().map(decode).collect()
    }
}

fn decode(row: &sqlx::postgres::PgRow) -> StorageResult<Membership> {
    let get = |e: sqlx::Error| StorageError::backend(format!("failed to deserialize membership row: {e}"));
    let tenant_id: String = row.try_get("tenant_id").map_err(get)?;
    let assigned_at: DateTime<Utc> = row.try_get("assigned_at").map_err(get)?;

    Ok(Membership {
        username: row.try_get("username").map_err(get)?,
        role: row.try_get("role").map_err(get)?,
        tenant_id: Some(
            TenantId::parse(tenant_id)
                .map_err(|e| StorageError::backend(format!("stored tenant id is invalid: {e}")))?,
        ),
        assigned_at,
    })
}
