//! Role membership: who holds which role, globally or within a tenant.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use itsm_core::{DomainError, DomainResult, Membership, MembershipRepository, TenantId};

use crate::principal::validate_username;
use crate::{Permission, RoleCatalog};

/// Role assignments backed by a [`MembershipRepository`].
///
/// Global and tenant-scoped contexts are exclusive: a query for a tenant
/// never sees the global role and vice versa.
#[derive(Clone)]
pub struct MembershipStore {
    repo: Arc<dyn MembershipRepository>,
    catalog: Arc<RoleCatalog>,
}

impl MembershipStore {
    pub fn new(repo: Arc<dyn MembershipRepository>, catalog: Arc<RoleCatalog>) -> Self {
        Self { repo, catalog }
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    /// Roles held by `username` in `tenant`, or the global role when no
    /// tenant is given.
    #[instrument(skip(self), err)]
    pub async fn get_roles(
        &self,
        username: &str,
        tenant: Option<&TenantId>,
    ) -> DomainResult<BTreeSet<String>> {
        validate_username(username)?;

        let roles = match tenant {
            Some(tenant) => self
                .repo
                .tenant_roles(username, tenant)
                .await?
                .into_iter()
                .collect(),
            None => self.repo.global_role(username).await?.into_iter().collect(),
        };

        debug!(?roles, "resolved roles");
        Ok(roles)
    }

    /// Grant `role`. Replaces the user's previous role in the same context.
    #[instrument(skip(self), err)]
    pub async fn assign(
        &self,
        username: &str,
        role: &str,
        tenant: Option<&TenantId>,
    ) -> DomainResult<u64> {
        validate_username(username)?;
        if !self.catalog.contains(role) {
            return Err(DomainError::invalid_role(role));
        }

        let affected = match tenant {
            Some(tenant) => self.repo.put_tenant_role(username, tenant, role).await?,
            None => self.repo.set_global_role(username, role).await?,
        };

        info!(affected, "role assigned");
        Ok(affected)
    }

    /// Remove `role` if the user holds it in that context. Zero rows is not
    /// an error.
    #[instrument(skip(self), err)]
    pub async fn revoke(
        &self,
        username: &str,
        role: &str,
        tenant: Option<&TenantId>,
    ) -> DomainResult<u64> {
        validate_username(username)?;
        if role.trim().is_empty() {
            return Err(DomainError::validation("role is empty"));
        }

        let affected = match tenant {
            Some(tenant) => self.repo.delete_tenant_role(username, tenant, role).await?,
            None => self.repo.clear_global_role(username, role).await?,
        };

        info!(affected, "role revoked");
        Ok(affected)
    }

    /// Union of the permissions of every role held in the context.
    pub async fn effective_permissions(
        &self,
        username: &str,
        tenant: Option<&TenantId>,
    ) -> DomainResult<BTreeSet<Permission>> {
        let roles = self.get_roles(username, tenant).await?;
        Ok(roles
            .iter()
            .flat_map(|role| self.catalog.permissions(role).iter().cloned())
            .collect())
    }

    pub async fn tenant_members(&self, tenant: &TenantId) -> DomainResult<Vec<Membership>> {
        Ok(self.repo.tenant_members(tenant).await?)
    }

    pub async fn user_tenants(&self, username: &str) -> DomainResult<Vec<Membership>> {
        validate_username(username)?;
        Ok(self.repo.user_tenants(username).await?)
    }
}

impl core::fmt::Debug for MembershipStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MembershipStore").finish_non_exhaustive()
    }
}
