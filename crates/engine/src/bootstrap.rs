//! Wiring of the engine services over in-memory or PostgreSQL storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use itsm_auth::{MembershipStore, ResourceHandler, ResourceLocator, RoleCatalog, RuleOverlay};
use itsm_core::{
    DomainError, MembershipRepository, PartitionProvisioner, StorageError, TenantRepository,
};
use itsm_infra::{
    EngineConfig, InMemoryMembershipRepository, InMemoryPartitionProvisioner,
    InMemoryResourceTable, InMemoryTenantRepository, PostgresAttributeLookup,
    PostgresMembershipRepository, PostgresPartitionProvisioner, PostgresTenantRepository,
    ResourceColumn,
};
use itsm_tenancy::{TenantDirectory, TenantProvisioner};

use crate::Authorizer;

/// Where the owner and department of a standard ITSM resource live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardResource {
    pub resource_type: &'static str,
    pub table: &'static str,
    pub key_column: &'static str,
    pub owner_column: &'static str,
    pub department_column: Option<&'static str>,
}

pub const STANDARD_RESOURCES: [StandardResource; 4] = [
    StandardResource {
        resource_type: "incident",
        table: "incidents",
        key_column: "ticket_id",
        owner_column: "created_by",
        department_column: Some("department"),
    },
    StandardResource {
        resource_type: "problem",
        table: "problems",
        key_column: "problem_id",
        owner_column: "assignee",
        department_column: Some("department"),
    },
    StandardResource {
        resource_type: "change",
        table: "changes",
        key_column: "change_id",
        owner_column: "requester",
        department_column: None,
    },
    StandardResource {
        resource_type: "asset",
        table: "assets",
        key_column: "asset_tag",
        owner_column: "owner",
        department_column: Some("department"),
    },
];

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Storage collaborators the engine is assembled from.
pub struct Storage {
    pub tenants: Arc<dyn TenantRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub partitions: Arc<dyn PartitionProvisioner>,
    pub locator: ResourceLocator,
}

/// Locator over the standard ITSM tables in PostgreSQL.
pub fn postgres_locator(pool: &PgPool, required: &[String]) -> Result<ResourceLocator, DomainError> {
    let mut builder = ResourceLocator::builder().require(required.iter().cloned());
    for resource in STANDARD_RESOURCES {
        let owner = PostgresAttributeLookup::new(
            pool.clone(),
            resource.table,
            resource.key_column,
            resource.owner_column,
        )?;
        let mut handler = ResourceHandler::new(Arc::new(owner));
        if let Some(column) = resource.department_column {
            let department =
                PostgresAttributeLookup::new(pool.clone(), resource.table, resource.key_column, column)?;
            handler = handler.with_department(Arc::new(department));
        }
        builder = builder.register(resource.resource_type, handler);
    }
    builder.build()
}

/// In-memory stores plus one resource table per standard resource type.
#[derive(Debug)]
pub struct InMemoryBackend {
    pub tenants: Arc<InMemoryTenantRepository>,
    pub memberships: Arc<InMemoryMembershipRepository>,
    pub partitions: Arc<InMemoryPartitionProvisioner>,
    resources: BTreeMap<&'static str, Arc<InMemoryResourceTable>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            tenants: Arc::new(InMemoryTenantRepository::new()),
            memberships: Arc::new(InMemoryMembershipRepository::new()),
            partitions: Arc::new(InMemoryPartitionProvisioner::new()),
            resources: STANDARD_RESOURCES
                .iter()
                .map(|r| (r.resource_type, InMemoryResourceTable::new()))
                .collect(),
        }
    }

    /// The table backing `resource_type`, for seeding rows.
    pub fn resources(&self, resource_type: &str) -> Option<&Arc<InMemoryResourceTable>> {
        self.resources.get(resource_type)
    }

    pub fn locator(&self, required: &[String]) -> Result<ResourceLocator, DomainError> {
        let mut builder = ResourceLocator::builder().require(required.iter().cloned());
        for resource in STANDARD_RESOURCES {
            let Some(table) = self.resources.get(resource.resource_type) else {
                continue;
            };
            let mut handler = ResourceHandler::new(table.column(ResourceColumn::Owner));
            if resource.department_column.is_some() {
                handler = handler.with_department(table.column(ResourceColumn::Department));
            }
            builder = builder.register(resource.resource_type, handler);
        }
        builder.build()
    }

    pub fn storage(&self, required: &[String]) -> Result<Storage, DomainError> {
        Ok(Storage {
            tenants: self.tenants.clone(),
            memberships: self.memberships.clone(),
            partitions: self.partitions.clone(),
            locator: self.locator(required)?,
        })
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// All engine services, wired once at start-up and shared.
pub struct Engine {
    catalog: Arc<RoleCatalog>,
    memberships: MembershipStore,
    directory: Arc<TenantDirectory>,
    provisioner: TenantProvisioner,
    authorizer: Authorizer,
}

impl Engine {
    pub fn assemble(config: &EngineConfig, catalog: RoleCatalog, storage: Storage) -> Self {
        let catalog = Arc::new(catalog);
        let memberships = MembershipStore::new(storage.memberships, catalog.clone());
        let directory = Arc::new(
            TenantDirectory::new(storage.tenants.clone()).with_base_domain(config.base_domain.clone()),
        );
        let provisioner = TenantProvisioner::new(
            storage.tenants,
            storage.partitions,
            memberships.clone(),
            directory.clone(),
        );
        let authorizer = Authorizer::new(
            memberships.clone(),
            Arc::new(storage.locator),
            Arc::new(RuleOverlay::new()),
            directory.clone(),
        );

        Self {
            catalog,
            memberships,
            directory,
            provisioner,
            authorizer,
        }
    }

    /// Engine over fresh in-memory stores, returning the stores for seeding.
    pub fn in_memory(config: &EngineConfig) -> Result<(Self, InMemoryBackend), BootstrapError> {
        let backend = InMemoryBackend::new();
        let storage = backend.storage(&config.required_resource_types)?;
        let engine = Self::assemble(config, RoleCatalog::standard(), storage);
        Ok((engine, backend))
    }

    /// Engine over PostgreSQL. Creates the engine-owned tables if needed.
    pub async fn connect(config: &EngineConfig) -> Result<Self, BootstrapError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| DomainError::validation("database url is not configured"))?;

        let pool = itsm_infra::postgres::connect(url, config).await?;
        itsm_infra::postgres::ensure_schema(&pool).await?;

        let storage = Storage {
            tenants: Arc::new(PostgresTenantRepository::new(pool.clone())),
            memberships: Arc::new(PostgresMembershipRepository::new(pool.clone())),
            partitions: Arc::new(PostgresPartitionProvisioner::new(pool.clone())),
            locator: postgres_locator(&pool, &config.required_resource_types)?,
        };

        info!(max_connections = config.max_connections, "connected to postgres");
        Ok(Self::assemble(config, RoleCatalog::standard(), storage))
    }

    /// PostgreSQL when a database URL is configured, in-memory otherwise.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, BootstrapError> {
        if config.database_url.is_some() {
            Self::connect(config).await
        } else {
            info!("no database configured, using in-memory stores");
            Ok(Self::in_memory(config)?.0)
        }
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    pub fn memberships(&self) -> &MembershipStore {
        &self.memberships
    }

    pub fn directory(&self) -> &TenantDirectory {
        &self.directory
    }

    pub fn provisioner(&self) -> &TenantProvisioner {
        &self.provisioner
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_engine_registers_every_standard_type() {
        let (engine, backend) = Engine::in_memory(&EngineConfig::default()).unwrap();
        let locator = backend.locator(&[]).unwrap();
        assert_eq!(
            locator.resource_types().into_iter().collect::<Vec<_>>(),
            ["asset", "change", "incident", "problem"]
        );
        assert!(backend.resources("incident").is_some());
        assert!(engine.catalog().contains("super_admin"));
    }

    #[test]
    fn unknown_required_type_fails_assembly() {
        let config = EngineConfig {
            required_resource_types: vec!["incident".into(), "vendor".into()],
            ..EngineConfig::default()
        };
        assert!(matches!(
            Engine::in_memory(&config),
            Err(BootstrapError::Domain(DomainError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn connect_requires_a_database_url() {
        let err = Engine::connect(&EngineConfig::default()).await.err().unwrap();
        assert!(matches!(err, BootstrapError::Domain(DomainError::Validation(_))));
    }
}
