//! Tenant lifecycle: creation, partition provisioning, settings and
//! deactivation.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use itsm_auth::MembershipStore;
use itsm_core::{
    DomainError, DomainResult, Membership, PartitionProvisioner, PartitionSchema, StorageError,
    Tenant, TenantId, TenantRepository, TenantSettings, TenantStats, TenantStatus,
};

use crate::TenantDirectory;

/// Role granted to a new tenant's administrator.
pub const TENANT_ADMIN_ROLE: &str = "admin";

/// Input for [`TenantProvisioner::create`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTenant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub admin_username: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub settings: Option<TenantSettings>,
}

impl NewTenant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn admin(mut self, username: impl Into<String>) -> Self {
        self.admin_username = Some(username.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn settings(mut self, settings: TenantSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    fn into_tenant(self) -> DomainResult<Tenant> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(DomainError::validation("tenant id is required"));
        }
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("tenant name is required"));
        }

        let id = TenantId::parse(id)?;
        if id.is_default() {
            return Err(DomainError::validation(format!(
                "tenant id '{id}' is reserved"
            )));
        }

        let admin_username = match self.admin_username {
            Some(admin) if admin.trim().is_empty() => {
                return Err(DomainError::validation("admin username is empty"));
            }
            Some(admin) => Some(admin.trim().to_string()),
            None => None,
        };

        let domain = self
            .domain
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty());

        Ok(Tenant {
            id,
            name: name.to_string(),
            description: self.description.unwrap_or_default(),
            admin_username,
            domain,
            settings: self.settings.unwrap_or_default(),
            status: TenantStatus::Active,
            created_at: Utc::now(),
            updated_at: None,
        })
    }
}

/// Creates and administers tenants.
///
/// Uniqueness is ultimately enforced by the tenant store; the pre-checks here
/// only produce friendlier errors for the common case.
pub struct TenantProvisioner {
    tenants: Arc<dyn TenantRepository>,
    partitions: Arc<dyn PartitionProvisioner>,
    memberships: MembershipStore,
    directory: Arc<TenantDirectory>,
    schema: PartitionSchema,
}

impl TenantProvisioner {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        partitions: Arc<dyn PartitionProvisioner>,
        memberships: MembershipStore,
        directory: Arc<TenantDirectory>,
    ) -> Self {
        Self {
            tenants,
            partitions,
            memberships,
            directory,
            schema: PartitionSchema::current(),
        }
    }

    pub fn with_schema(mut self, schema: PartitionSchema) -> Self {
        self.schema = schema;
        self
    }

    #[instrument(skip(self, new), fields(tenant_id = %new.id), err)]
    pub async fn create(&self, new: NewTenant) -> DomainResult<Tenant> {
        let tenant = new.into_tenant()?;

        if self.tenants.find_by_id(&tenant.id).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "tenant '{}' already exists",
                tenant.id
            )));
        }
        if let Some(domain) = tenant.domain.as_deref() {
            if self.tenants.find_active_by_domain(domain).await?.is_some() {
                return Err(DomainError::conflict(format!(
                    "domain '{domain}' is already in use"
                )));
            }
        }

        self.tenants.insert(&tenant).await.map_err(|e| match e {
            StorageError::UniqueViolation(constraint) => {
                warn!(%constraint, "lost tenant creation race");
                DomainError::conflict(format!(
                    "tenant '{}' conflicts with an existing tenant ({constraint})",
                    tenant.id
                ))
            }
            other => DomainError::Storage(other),
        })?;

        self.partitions.provision(&tenant.id, &self.schema).await?;

        if let Some(admin) = tenant.admin_username.as_deref() {
            self.memberships
                .assign(admin, TENANT_ADMIN_ROLE, Some(&tenant.id))
                .await?;
        }

        self.directory.invalidate(&tenant.id);
        info!(schema_version = self.schema.version, "tenant created");
        Ok(tenant)
    }

    /// Replace the tenant's settings. Returns the number of rows changed.
    #[instrument(skip(self, id, settings), fields(tenant_id = %id), err)]
    pub async fn update_settings(&self, id: &TenantId, settings: TenantSettings) -> DomainResult<u64> {
        let affected = self.tenants.update_settings(id, &settings, Utc::now()).await?;
        self.directory.invalidate(id);
        Ok(affected)
    }

    /// Soft-deactivate. The row stays, so the id can never be reused.
    #[instrument(skip(self, id), fields(tenant_id = %id), err)]
    pub async fn deactivate(&self, id: &TenantId) -> DomainResult<u64> {
        let affected = self
            .tenants
            .set_status(id, TenantStatus::Inactive, Utc::now())
            .await?;
        self.directory.invalidate(id);
        info!(affected, "tenant deactivated");
        Ok(affected)
    }

    /// All tenants regardless of status, newest first.
    pub async fn list_tenants(&self) -> DomainResult<Vec<Tenant>> {
        Ok(self.tenants.list().await?)
    }

    pub async fn tenant_users(&self, id: &TenantId) -> DomainResult<Vec<Membership>> {
        self.memberships.tenant_members(id).await
    }

    #[instrument(skip(self, id), fields(tenant_id = %id), err)]
    pub async fn stats(&self, id: &TenantId) -> DomainResult<TenantStats> {
        if self.tenants.find_by_id(id).await?.is_none() {
            return Err(DomainError::not_found(format!("tenant '{id}'")));
        }

        let users = self.memberships.tenant_members(id).await?.len() as u64;
        let counts = self.partitions.row_counts(id, &self.schema).await?;
        let count = |name: &str| counts.get(name).copied().unwrap_or(0);

        Ok(TenantStats {
            users,
            incidents: count("incidents"),
            assets: count("assets"),
            audit_logs: count("audit_logs"),
        })
    }
}

impl core::fmt::Debug for TenantProvisioner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TenantProvisioner")
            .field("schema_version", &self.schema.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use itsm_auth::RoleCatalog;
    use itsm_core::{MembershipRepository, StorageResult};
    use itsm_infra::{
        InMemoryMembershipRepository, InMemoryPartitionProvisioner, InMemoryTenantRepository,
    };
    use serde_json::json;

    use super::*;

    struct Fixture {
        tenants: Arc<InMemoryTenantRepository>,
        partitions: Arc<InMemoryPartitionProvisioner>,
        memberships: MembershipStore,
        directory: Arc<TenantDirectory>,
        provisioner: TenantProvisioner,
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(InMemoryTenantRepository::new()), None)
    }

    fn fixture_with(
        tenants: Arc<InMemoryTenantRepository>,
        front: Option<Arc<dyn TenantRepository>>,
    ) -> Fixture {
        let partitions = Arc::new(InMemoryPartitionProvisioner::new());
        let repo: Arc<dyn MembershipRepository> = Arc::new(InMemoryMembershipRepository::new());
        let memberships = MembershipStore::new(repo, Arc::new(RoleCatalog::standard()));
        let store: Arc<dyn TenantRepository> = front.unwrap_or_else(|| tenants.clone() as Arc<dyn TenantRepository>);
        let directory = Arc::new(TenantDirectory::new(store.clone()));
        let provisioner = TenantProvisioner::new(
            store,
            partitions.clone(),
            memberships.clone(),
            directory.clone(),
        );
        Fixture {
            tenants,
            partitions,
            memberships,
            directory,
            provisioner,
        }
    }

    fn id(value: &str) -> TenantId {
        TenantId::parse(value).unwrap()
    }

    #[tokio::test]
    async fn create_provisions_partition_and_grants_admin() {
        let f = fixture();
        let tenant = f
            .provisioner
            .create(NewTenant::new("acme", "Acme").admin("alice").domain("Acme.Example.com"))
            .await
            .unwrap();

        assert_eq!(tenant.domain.as_deref(), Some("acme.example.com"));
        assert!(tenant.is_active());
        assert_eq!(
            f.partitions.collections(&tenant.id).unwrap(),
            ["assets", "audit_logs", "incidents"]
        );
        assert_eq!(f.partitions.version(&tenant.id), Some(1));

        let roles = f.memberships.get_roles("alice", Some(&tenant.id)).await.unwrap();
        assert_eq!(roles.into_iter().collect::<Vec<_>>(), ["admin"]);
        assert!(f.directory.is_valid(&tenant.id).await.unwrap());
    }

    #[tokio::test]
    async fn second_create_conflicts_and_keeps_the_first() {
        let f = fixture();
        f.provisioner
            .create(NewTenant::new("acme", "Acme"))
            .await
            .unwrap();

        let err = f
            .provisioner
            .create(NewTenant::new("acme", "Impostor"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let stored = f.tenants.find_by_id(&id("acme")).await.unwrap().unwrap();
        assert_eq!(stored.name, "Acme");
    }

    #[tokio::test]
    async fn deactivated_ids_cannot_be_reused() {
        let f = fixture();
        f.provisioner.create(NewTenant::new("acme", "Acme")).await.unwrap();
        f.provisioner.deactivate(&id("acme")).await.unwrap();

        let err = f
            .provisioner
            .create(NewTenant::new("acme", "Acme again"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn active_domains_are_unique() {
        let f = fixture();
        f.provisioner
            .create(NewTenant::new("acme", "Acme").domain("acme.example.com"))
            .await
            .unwrap();

        let err = f
            .provisioner
            .create(NewTenant::new("acme2", "Acme 2").domain("acme.example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_storage() {
        let f = fixture();
        for new in [
            NewTenant::new("", "Nameless"),
            NewTenant::new("acme", "  "),
            NewTenant::new("default", "Default"),
            NewTenant::new("Acme Corp", "Acme"),
            NewTenant::new("acme", "Acme").admin(""),
        ] {
            let err = f.provisioner.create(new).await.unwrap_err();
            assert!(err.is_validation(), "{err}");
        }
        assert!(f.provisioner.list_tenants().await.unwrap().is_empty());
    }

    /// Hides existing rows from `find_by_id`, as a concurrent creator would see
    /// them just before either insert commits.
    struct BlindPrecheck(Arc<InMemoryTenantRepository>);

    #[async_trait]
    impl TenantRepository for BlindPrecheck {
        async fn find_by_id(&self, _id: &TenantId) -> StorageResult<Option<Tenant>> {
            Ok(None)
        }
        async fn find_active_by_domain(&self, _domain: &str) -> StorageResult<Option<Tenant>> {
            Ok(None)
        }
        async fn insert(&self, tenant: &Tenant) -> StorageResult<()> {
            self.0.insert(tenant).await
        }
        async fn update_settings(
            &self,
            id: &TenantId,
            settings: &TenantSettings,
            updated_at: DateTime<Utc>,
        ) -> StorageResult<u64> {
            self.0.update_settings(id, settings, updated_at).await
        }
        async fn set_status(
            &self,
            id: &TenantId,
            status: TenantStatus,
            updated_at: DateTime<Utc>,
        ) -> StorageResult<u64> {
            self.0.set_status(id, status, updated_at).await
        }
        async fn list(&self) -> StorageResult<Vec<Tenant>> {
            self.0.list().await
        }
    }

    #[tokio::test]
    async fn losing_a_creation_race_is_a_conflict() {
        let tenants = Arc::new(InMemoryTenantRepository::new());
        let front: Arc<dyn TenantRepository> = Arc::new(BlindPrecheck(tenants.clone()));
        let f = fixture_with(tenants, Some(front));

        f.provisioner.create(NewTenant::new("acme", "First")).await.unwrap();
        let err = f
            .provisioner
            .create(NewTenant::new("acme", "Second"))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
        let stored = f.tenants.find_by_id(&id("acme")).await.unwrap().unwrap();
        assert_eq!(stored.name, "First");
    }

    #[tokio::test]
    async fn settings_update_evicts_the_cache() {
        let f = fixture();
        let acme = id("acme");
        f.provisioner.create(NewTenant::new("acme", "Acme")).await.unwrap();
        assert!(f.directory.get_by_id(&acme).await.unwrap().unwrap().settings.is_empty());

        let mut settings = TenantSettings::new();
        settings.insert("theme".into(), json!("dark"));
        assert_eq!(f.provisioner.update_settings(&acme, settings).await.unwrap(), 1);

        let cached = f.directory.get_by_id(&acme).await.unwrap().unwrap();
        assert_eq!(cached.settings.get("theme"), Some(&json!("dark")));
        assert!(cached.updated_at.is_some());
    }

    #[tokio::test]
    async fn deactivation_hides_the_tenant() {
        let f = fixture();
        let acme = id("acme");
        f.provisioner.create(NewTenant::new("acme", "Acme")).await.unwrap();
        assert!(f.directory.get_by_id(&acme).await.unwrap().is_some());

        assert_eq!(f.provisioner.deactivate(&acme).await.unwrap(), 1);
        assert!(f.directory.get_by_id(&acme).await.unwrap().is_none());
        assert_eq!(f.provisioner.deactivate(&id("ghost")).await.unwrap(), 0);

        let listed = f.provisioner.list_tenants().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, TenantStatus::Inactive);
    }

    #[tokio::test]
    async fn stats_count_members_and_partition_rows() {
        let f = fixture();
        let acme = id("acme");
        f.provisioner
            .create(NewTenant::new("acme", "Acme").admin("alice"))
            .await
            .unwrap();
        f.memberships.assign("bob", "viewer", Some(&acme)).await.unwrap();
        f.partitions.add_rows(&acme, "incidents", 3).unwrap();
        f.partitions.add_rows(&acme, "audit_logs", 7).unwrap();

        let stats = f.provisioner.stats(&acme).await.unwrap();
        assert_eq!(
            stats,
            TenantStats {
                users: 2,
                incidents: 3,
                assets: 0,
                audit_logs: 7,
            }
        );
        assert_eq!(f.provisioner.tenant_users(&acme).await.unwrap().len(), 2);

        assert!(matches!(
            f.provisioner.stats(&id("ghost")).await,
            Err(DomainError::NotFound(_))
        ));
    }
}
