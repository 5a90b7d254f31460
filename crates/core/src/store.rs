//! Persistence interfaces required from the storage collaborator.
//!
//! The engine treats every call here as blocking I/O against a durable store.
//! It does not make concurrent writes atomic itself; uniqueness of tenant ids
//! and active domains must be enforced by the implementation and reported as
//! [`StorageError::UniqueViolation`](crate::StorageError::UniqueViolation).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageResult;
use crate::id::TenantId;
use crate::partition::PartitionSchema;
use crate::tenant::{Membership, Tenant, TenantSettings, TenantStatus};

/// Tenant rows keyed by id and by domain.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Look up a tenant by id regardless of status.
    async fn find_by_id(&self, id: &TenantId) -> StorageResult<Option<Tenant>>;

    /// Look up an active tenant by its domain.
    async fn find_active_by_domain(&self, domain: &str) -> StorageResult<Option<Tenant>>;

    /// Insert a new tenant row. Must fail with `UniqueViolation` when the id
    /// exists (any status) or the domain is held by another active tenant.
    async fn insert(&self, tenant: &Tenant) -> StorageResult<()>;

    /// Replace a tenant's settings. Returns the number of rows changed.
    async fn update_settings(
        &self,
        id: &TenantId,
        settings: &TenantSettings,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<u64>;

    /// Change a tenant's status. Returns the number of rows changed.
    async fn set_status(
        &self,
        id: &TenantId,
        status: TenantStatus,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<u64>;

    /// All tenants, newest first.
    async fn list(&self) -> StorageResult<Vec<Tenant>>;
}

/// Role assignments keyed by username (optionally + tenant).
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn global_role(&self, username: &str) -> StorageResult<Option<String>>;

    async fn tenant_roles(&self, username: &str, tenant_id: &TenantId) -> StorageResult<Vec<String>>;

    /// Set (or replace) the user's single global role.
    async fn set_global_role(&self, username: &str, role: &str) -> StorageResult<u64>;

    /// Clear the global role, only if it currently equals `role`.
    async fn clear_global_role(&self, username: &str, role: &str) -> StorageResult<u64>;

    /// Set (or replace) the user's single role within a tenant.
    async fn put_tenant_role(
        &self,
        username: &str,
        tenant_id: &TenantId,
        role: &str,
    ) -> StorageResult<u64>;

    async fn delete_tenant_role(
        &self,
        username: &str,
        tenant_id: &TenantId,
        role: &str,
    ) -> StorageResult<u64>;

    async fn tenant_members(&self, tenant_id: &TenantId) -> StorageResult<Vec<Membership>>;

    async fn user_tenants(&self, username: &str) -> StorageResult<Vec<Membership>>;
}

/// Single-attribute lookup for one resource type (e.g. incident creator).
///
/// `Ok(None)` means "no such resource" or "attribute not set".
#[async_trait]
pub trait AttributeLookup: Send + Sync {
    async fn lookup(&self, resource_id: &str) -> StorageResult<Option<String>>;
}

/// Creates and inspects per-tenant partitions.
#[async_trait]
pub trait PartitionProvisioner: Send + Sync {
    /// Idempotently create every collection in `schema` for the tenant.
    async fn provision(&self, tenant_id: &TenantId, schema: &PartitionSchema) -> StorageResult<()>;

    /// Row count per collection of the tenant's partition.
    async fn row_counts(
        &self,
        tenant_id: &TenantId,
        schema: &PartitionSchema,
    ) -> StorageResult<BTreeMap<String, u64>>;
}
