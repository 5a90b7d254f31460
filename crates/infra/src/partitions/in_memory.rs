use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use itsm_core::{PartitionProvisioner, PartitionSchema, StorageError, StorageResult, TenantId};

#[derive(Debug, Clone, Default)]
struct Partition {
    version: u32,
    rows: BTreeMap<String, u64>,
}

/// In-memory partitions for tests/dev: one row counter per collection.
#[derive(Debug, Default)]
pub struct InMemoryPartitionProvisioner {
    partitions: RwLock<HashMap<TenantId, Partition>>,
}

impl InMemoryPartitionProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collections present for the tenant, or `None` when never provisioned.
    pub fn collections(&self, tenant_id: &TenantId) -> Option<Vec<String>> {
        let partitions = self.partitions.read().ok()?;
        partitions
            .get(tenant_id)
            .map(|p| p.rows.keys().cloned().collect())
    }

    pub fn version(&self, tenant_id: &TenantId) -> Option<u32> {
        let partitions = self.partitions.read().ok()?;
        partitions.get(tenant_id).map(|p| p.version)
    }

    /// Simulate rows written into a tenant collection by the CRUD services.
    pub fn add_rows(&self, tenant_id: &TenantId, collection: &str, count: u64) -> StorageResult<()> {
        let mut partitions = self.partitions.write().map_err(|_| poisoned())?;
        let partition = partitions
            .get_mut(tenant_id)
            .ok_or_else(|| missing(tenant_id))?;
        let rows = partition
            .rows
            .get_mut(collection)
            .ok_or_else(|| StorageError::backend(format!("collection '{collection}' does not exist")))?;
        *rows += count;
        Ok(())
    }
}

fn poisoned() -> StorageError {
    StorageError::backend("partition lock poisoned")
}

fn missing(tenant_id: &TenantId) -> StorageError {
    StorageError::backend(format!("partition for tenant '{tenant_id}' does not exist"))
}

#[async_trait]
impl PartitionProvisioner for InMemoryPartitionProvisioner {
    async fn provision(&self, tenant_id: &TenantId, schema: &PartitionSchema) -> StorageResult<()> {
        let mut partitions = self.partitions.write().map_err(|_| poisoned())?;
        let partition = partitions.entry(tenant_id.clone()).or_default();
        for collection in &schema.collections {
            partition.rows.entry(collection.name.to_string()).or_insert(0);
        }
        partition.version = partition.version.max(schema.version);
        Ok(())
    }

    async fn row_counts(
        &self,
        tenant_id: &TenantId,
        schema: &PartitionSchema,
    ) -> StorageResult<BTreeMap<String, u64>> {
        let partitions = self.partitions.read().map_err(|_| poisoned())?;
        let partition = partitions.get(tenant_id).ok_or_else(|| missing(tenant_id))?;

        schema
            .collections
            .iter()
            .map(|c| {
                partition
                    .rows
                    .get(c.name)
                    .map(|n| (c.name.to_string(), *n))
                    .ok_or_else(|| StorageError::backend(format!("collection '{}' does not exist", c.name)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provisioning_twice_keeps_existing_rows() {
        let partitions = InMemoryPartitionProvisioner::new();
        let acme = TenantId::parse("acme").unwrap();
        let schema = PartitionSchema::current();

        partitions.provision(&acme, &schema).await.unwrap();
        partitions.add_rows(&acme, "incidents", 3).unwrap();
        partitions.provision(&acme, &schema).await.unwrap();

        let counts = partitions.row_counts(&acme, &schema).await.unwrap();
        assert_eq!(counts.get("incidents"), Some(&3));
        assert_eq!(counts.get("assets"), Some(&0));
        assert_eq!(partitions.version(&acme), Some(schema.version));
    }

    #[tokio::test]
    async fn counting_an_unprovisioned_partition_fails() {
        let partitions = InMemoryPartitionProvisioner::new();
        let ghost = TenantId::parse("ghost").unwrap();
        assert!(partitions.collections(&ghost).is_none());
        assert!(partitions
            .row_counts(&ghost, &PartitionSchema::current())
            .await
            .is_err());
    }
}
