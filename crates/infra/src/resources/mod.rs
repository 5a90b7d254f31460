//! Owner / department attribute lookups for ITSM resources.

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryResourceTable, ResourceColumn};
pub use postgres::PostgresAttributeLookup;
