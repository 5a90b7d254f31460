//! `itsm-core` — shared domain primitives for the authorization engine.
//!
//! Identifiers, tenant records, the error model and the storage collaborator
//! traits. No I/O happens in this crate.

pub mod error;
pub mod id;
pub mod partition;
pub mod resource;
pub mod store;
pub mod tenant;

pub use error::{DomainError, DomainResult, StorageError, StorageResult};
pub use id::{DEFAULT_TENANT, TenantId};
pub use partition::{CollectionSpec, ColumnSpec, PARTITION_SCHEMA_VERSION, PartitionSchema};
pub use resource::ResourceRef;
pub use store::{AttributeLookup, MembershipRepository, PartitionProvisioner, TenantRepository};
pub use tenant::{Membership, Tenant, TenantSettings, TenantStats, TenantStatus};
