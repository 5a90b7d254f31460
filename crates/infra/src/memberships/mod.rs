//! Global and tenant-scoped role assignments.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryMembershipRepository;
pub use postgres::PostgresMembershipRepository;
