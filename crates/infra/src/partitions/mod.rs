//! Per-tenant partition provisioning.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryPartitionProvisioner;
pub use postgres::PostgresPartitionProvisioner;
