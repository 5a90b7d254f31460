//! Infrastructure layer: storage collaborators and configuration.
//!
//! Every concern ships an in-memory implementation (tests/dev) and a
//! PostgreSQL implementation backed by a shared `sqlx` pool.

pub mod config;
pub mod memberships;
pub mod partitions;
pub mod postgres;
pub mod resources;
pub mod tenants;

pub use config::{ConfigError, EngineConfig, LogFormat};
pub use memberships::{InMemoryMembershipRepository, PostgresMembershipRepository};
pub use partitions::{InMemoryPartitionProvisioner, PostgresPartitionProvisioner};
pub use resources::{InMemoryResourceTable, PostgresAttributeLookup, ResourceColumn};
pub use tenants::{InMemoryTenantRepository, PostgresTenantRepository};
