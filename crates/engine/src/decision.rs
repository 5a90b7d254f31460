use serde::Serialize;
use uuid::Uuid;

use itsm_core::{ResourceRef, TenantId};

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBasis {
    /// A held role carries `*`.
    Wildcard,
    /// A held role carries the permission and no resource was named.
    RoleGrant,
    /// The principal owns the resource.
    Owner,
    /// The principal's department matches the resource's.
    Department,
    OverrideAllow,
    OverrideDeny,
    /// Permission held, but nothing ties the principal to the resource.
    NoResourceMatch,
    MissingPermission,
    /// The named tenant is unknown or inactive.
    UnknownTenant,
}

impl DecisionBasis {
    pub fn is_allow(self) -> bool {
        matches!(
            self,
            Self::Wildcard | Self::RoleGrant | Self::Owner | Self::Department | Self::OverrideAllow
        )
    }
}

/// The outcome of one authorization check.
///
/// Callers should surface only `allowed`; the rest is for logs and admin
/// tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub decision_id: Uuid,
    pub allowed: bool,
    pub basis: DecisionBasis,
    /// The role that carried the permission, if any did.
    pub role: Option<String>,
    pub username: String,
    pub permission: String,
    pub resource: Option<ResourceRef>,
    pub tenant: Option<TenantId>,
}

impl Decision {
    pub(crate) fn new(
        basis: DecisionBasis,
        role: Option<String>,
        request: &DecisionRequest<'_>,
    ) -> Self {
        Self {
            decision_id: Uuid::now_v7(),
            allowed: basis.is_allow(),
            basis,
            role,
            username: request.username.to_string(),
            permission: request.permission.to_string(),
            resource: request.resource.cloned(),
            tenant: request.tenant.cloned(),
        }
    }
}

pub(crate) struct DecisionRequest<'a> {
    pub username: &'a str,
    pub permission: &'a str,
    pub resource: Option<&'a ResourceRef>,
    pub tenant: Option<&'a TenantId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_determines_allowed() {
        let request = DecisionRequest {
            username: "alice",
            permission: "incidents.update",
            resource: None,
            tenant: None,
        };
        let allow = Decision::new(DecisionBasis::Owner, Some("analyst".into()), &request);
        let deny = Decision::new(DecisionBasis::OverrideDeny, Some("analyst".into()), &request);
        assert!(allow.allowed);
        assert!(!deny.allowed);
        assert_ne!(allow.decision_id, deny.decision_id);
    }

    #[test]
    fn serializes_basis_in_snake_case() {
        let request = DecisionRequest {
            username: "bob",
            permission: "incidents.view",
            resource: None,
            tenant: None,
        };
        let decision = Decision::new(DecisionBasis::MissingPermission, None, &request);
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["basis"], "missing_permission");
        assert_eq!(json["allowed"], false);
    }
}
