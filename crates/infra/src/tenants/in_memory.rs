use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use itsm_core::{StorageError, StorageResult, Tenant, TenantId, TenantRepository, TenantSettings, TenantStatus};

/// In-memory tenant table for tests/dev.
///
/// Enforces the same uniqueness rules as the Postgres schema: ids are unique
/// across all statuses, domains are unique among active tenants.
#[derive(Debug, Default)]
pub struct InMemoryTenantRepository {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl InMemoryTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a row directly, bypassing uniqueness checks. Simulates writes made
    /// to the backing store by another process.
    pub fn put_unchecked(&self, tenant: Tenant) -> StorageResult<()> {
        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;
        tenants.insert(tenant.id.clone(), tenant);
        Ok(())
    }
}

fn poisoned() -> StorageError {
    StorageError::backend("tenant table lock poisoned")
}

#[async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn find_by_id(&self, id: &TenantId) -> StorageResult<Option<Tenant>> {
        let tenants = self.tenants.read().map_err(|_| poisoned())?;
        Ok(tenants.get(id).cloned())
    }

    async fn find_active_by_domain(&self, domain: &str) -> StorageResult<Option<Tenant>> {
        let tenants = self.tenants.read().map_err(|_| poisoned())?;
        Ok(tenants
            .values()
            .find(|t| t.is_active() && t.domain.as_deref() == Some(domain))
            .cloned())
    }

    async fn insert(&self, tenant: &Tenant) -> StorageResult<()> {
        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;

        if tenants.contains_key(&tenant.id) {
            return Err(StorageError::UniqueViolation("tenants_pkey".to_string()));
        }
        if let Some(domain) = tenant.domain.as_deref() {
            let taken = tenant.is_active()
                && tenants
                    .values()
                    .any(|t| t.is_active() && t.domain.as_deref() == Some(domain));
            if taken {
                return Err(StorageError::UniqueViolation(
                    "tenants_active_domain_key".to_string(),
                ));
            }
        }

        tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(())
    }

    async fn update_settings(
        &self,
        id: &TenantId,
        settings: &TenantSettings,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;
        Ok(match tenants.get_mut(id) {
            Some(tenant) => {
                tenant.settings = settings.clone();
                tenant.updated_at = Some(updated_at);
                1
            }
            None => 0,
        })
    }

    async fn set_status(
        &self,
        id: &TenantId,
        status: TenantStatus,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;
        Ok(match tenants.get_mut(id) {
            Some(tenant) => {
                tenant.status = status;
                tenant.updated_at = Some(updated_at);
                1
            }
            None => 0,
        })
    }

    async fn list(&self) -> StorageResult<Vec<Tenant>> {
        let tenants = self.tenants.read().map_err(|_| poisoned())?;
        let mut all: Vec<Tenant> = tenants.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }
}
