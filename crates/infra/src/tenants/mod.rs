//! Tenant rows keyed by id and by domain.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryTenantRepository;
pub use postgres::PostgresTenantRepository;
