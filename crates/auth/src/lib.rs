//! `itsm-auth` — role catalog, memberships, resource attributes and override
//! rules.
//!
//! Authentication happens upstream; this crate only answers "what may this
//! principal do" and is decoupled from HTTP.

pub mod authorize;
pub mod locator;
pub mod membership;
pub mod overlay;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, RoleGrant, role_grant};
pub use locator::{ResourceHandler, ResourceLocator, ResourceLocatorBuilder};
pub use membership::MembershipStore;
pub use overlay::{OverlayDecision, OverrideRule, RuleOverlay};
pub use permissions::{Permission, WILDCARD};
pub use principal::Principal;
pub use roles::{PermissionDescriptor, Role, RoleCatalog, RoleDefinition, RoleDescriptor};
