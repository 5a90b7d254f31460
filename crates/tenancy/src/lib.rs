//! `itsm-tenancy` — tenant resolution, cached lookups and provisioning.

pub mod directory;
pub mod provisioner;
pub mod resolve;

pub use directory::{ResolvedTenant, TenantDirectory};
pub use provisioner::{NewTenant, TenantProvisioner};
pub use resolve::{ResolutionContext, ResolutionSource};
