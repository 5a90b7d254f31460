use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use itsm_core::{Membership, MembershipRepository, StorageError, StorageResult, TenantId};

#[derive(Debug, Default)]
struct Assignments {
    global: HashMap<String, Membership>,
    scoped: HashMap<(String, TenantId), Membership>,
}

/// In-memory role assignments for tests/dev.
///
/// Keyed so that a user holds at most one global role and at most one role per
/// tenant; writes replace.
#[derive(Debug, Default)]
pub struct InMemoryMembershipRepository {
    inner: RwLock<Assignments>,
}

impl InMemoryMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StorageError {
    StorageError::backend("membership lock poisoned")
}

#[async_trait]
impl MembershipRepository for InMemoryMembershipRepository {
    async fn global_role(&self, username: &str) -> StorageResult<Option<String>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.global.get(username).map(|m| m.role.clone()))
    }

    async fn tenant_roles(&self, username: &str, tenant_id: &TenantId) -> StorageResult<Vec<String>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner
            .scoped
            .get(&(username.to_string(), tenant_id.clone()))
            .map(|m| vec![m.role.clone()])
            .unwrap_or_default())
    }

    async fn set_global_role(&self, username: &str, role: &str) -> StorageResult<u64> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        inner.global.insert(
            username.to_string(),
            Membership {
                username: username.to_string(),
                role: role.to_string(),
                tenant_id: None,
                assigned_at: Utc::now(),
            },
        );
        Ok(1)
    }

    async fn clear_global_role(&self, username: &str, role: &str) -> StorageResult<u64> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let held = inner.global.get(username).is_some_and(|m| m.role == role);
        if held {
            inner.global.remove(username);
            Ok(1)
        } else {
            Ok(0)
        }
    }

    async fn put_tenant_role(
        &self,
        username: &str,
        tenant_id: &TenantId,
        role: &str,
    ) -> StorageResult<u64> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        inner.scoped.insert(
            (username.to_string(), tenant_id.clone()),
            Membership {
                username: username.to_string(),
                role: role.to_string(),
                tenant_id: Some(tenant_id.clone()),
                assigned_at: Utc::now(),
            },
        );
        Ok(1)
    }

    async fn delete_tenant_role(
        &self,
        username: &str,
        tenant_id: &TenantId,
        role: &str,
    ) -> StorageResult<u64> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let key = (username.to_string(), tenant_id.clone());
        let held = inner.scoped.get(&key).is_some_and(|m| m.role == role);
        if held {
            inner.scoped.remove(&key);
            Ok(1)
        } else {
            Ok(0)
        }
    }

    async fn tenant_members(&self, tenant_id: &TenantId) -> StorageResult<Vec<Membership>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        let mut members: Vec<Membership> = inner
            .scoped
            .values()
            .filter(|m| m.tenant_id.as_ref() == Some(tenant_id))
            .cloned()
            .collect();
        members.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(members)
    }

    async fn user_tenants(&self, username: &str) -> StorageResult<Vec<Membership>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        let mut memberships: Vec<Membership> = inner
            .scoped
            .values()
            .filter(|m| m.username == username)
            .cloned()
            .collect();
        memberships.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        Ok(memberships)
    }
}
