//! Postgres-backed partitions: one schema per tenant, one table per collection.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use itsm_core::{CollectionSpec, PartitionProvisioner, PartitionSchema, StorageResult, TenantId};

use crate::postgres::{map_sqlx_error, partition_schema_name};

#[derive(Debug, Clone)]
pub struct PostgresPartitionProvisioner {
    pool: Arc<PgPool>,
}

impl PostgresPartitionProvisioner {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn create_table_sql(schema_name: &str, collection: &CollectionSpec) -> String {
    let columns = collection
        .columns
        .iter()
        .map(|c| format!("\"{}\" {}", c.name, c.sql_type))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {}.\"{}\" ({})",
        schema_name, collection.name, columns
    )
}

#[async_trait]
impl PartitionProvisioner for PostgresPartitionProvisioner {
    #[instrument(skip(self, schema), fields(tenant_id = %tenant_id, version = schema.version), err)]
    async fn provision(&self, tenant_id: &TenantId, schema: &PartitionSchema) -> StorageResult<()> {
        let schema_name = partition_schema_name(tenant_id);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {schema_name}"))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_partition_schema", e))?;

        for collection in &schema.collections {
            debug!(collection = collection.name, "creating partition collection");
            sqlx::query(&create_table_sql(&schema_name, collection))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("create_partition_table", e))?;
        }

        sqlx::query(
            r#"
            INSERT INTO tenant_partitions (tenant_id, schema_version, provisioned_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (tenant_id)
            DO UPDATE SET
                schema_version = GREATEST(tenant_partitions.schema_version, EXCLUDED.schema_version),
                provisioned_at = EXCLUDED.provisioned_at
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(i32::try_from(schema.version).unwrap_or(i32::MAX))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("record_partition", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(())
    }

    #[instrument(skip(self, schema), fields(tenant_id = %tenant_id), err)]
    async fn row_counts(
        &self,
        tenant_id: &TenantId,
        schema: &PartitionSchema,
    ) -> StorageResult<BTreeMap<String, u64>> {
        let schema_name = partition_schema_name(tenant_id);
        let mut counts = BTreeMap::new();

        for collection in &schema.collections {
            let row = sqlx::query(&format!(
                "SELECT COUNT(*) AS count FROM {}.\"{}\"",
                schema_name, collection.name
            ))
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_partition_rows", e))?;

            let count: i64 = row
                .try_get("count")
                .map_err(|e| map_sqlx_error("count_partition_rows", e))?;
            counts.insert(collection.name.to_string(), u64::try_from(count).unwrap_or(0));
        }

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_sql_quotes_every_identifier() {
        let schema = PartitionSchema::current();
        let assets = schema.collection("assets").unwrap();
        let sql = create_table_sql("\"tenant_acme\"", assets);

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"tenant_acme\".\"assets\" ("));
        assert!(sql.contains("\"asset_tag\" TEXT UNIQUE"));
        assert!(sql.contains("\"owner\" TEXT"));
    }
}
