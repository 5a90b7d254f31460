//! The single entry point for "may this principal do this?".

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use itsm_auth::{
    AuthzError, MembershipStore, OverlayDecision, OverrideRule, Permission, Principal,
    ResourceLocator, RoleGrant, RuleOverlay, role_grant,
};
use itsm_core::{DomainError, DomainResult, ResourceRef, TenantId};
use itsm_tenancy::TenantDirectory;

use crate::decision::{Decision, DecisionBasis, DecisionRequest};

/// Composes memberships, resource attributes and override rules into one
/// decision.
///
/// Order of evaluation for a held permission on a named resource: ownership,
/// then department, then the tenant's override rules. An override can grant
/// access that attributes do not, but never revokes access that ownership or
/// department already granted.
#[derive(Clone)]
pub struct Authorizer {
    memberships: MembershipStore,
    locator: Arc<ResourceLocator>,
    overlay: Arc<RuleOverlay>,
    directory: Arc<TenantDirectory>,
}

impl Authorizer {
    pub fn new(
        memberships: MembershipStore,
        locator: Arc<ResourceLocator>,
        overlay: Arc<RuleOverlay>,
        directory: Arc<TenantDirectory>,
    ) -> Self {
        Self {
            memberships,
            locator,
            overlay,
            directory,
        }
    }

    /// Boolean form of [`check`](Self::check). Any error denies.
    pub async fn is_allowed(
        &self,
        principal: &Principal,
        permission: &Permission,
        resource: Option<&ResourceRef>,
        tenant: Option<&TenantId>,
    ) -> bool {
        match self.check(principal, permission, resource, tenant).await {
            Ok(decision) => decision.allowed,
            Err(err) => {
                warn!(
                    user = %principal.username,
                    %permission,
                    error = %err,
                    "authorization check failed, denying"
                );
                false
            }
        }
    }

    #[instrument(
        skip_all,
        fields(
            user = %principal.username,
            permission = %permission,
            resource = ?resource.map(ToString::to_string),
            tenant = ?tenant.map(TenantId::as_str),
        ),
        err
    )]
    pub async fn check(
        &self,
        principal: &Principal,
        permission: &Permission,
        resource: Option<&ResourceRef>,
        tenant: Option<&TenantId>,
    ) -> Result<Decision, AuthzError> {
        principal.validate()?;
        permission.validate()?;
        if let Some(resource) = resource {
            resource.validate()?;
        }

        let request = DecisionRequest {
            username: &principal.username,
            permission: permission.as_str(),
            resource,
            tenant,
        };

        if let Some(tenant) = tenant {
            if !tenant.is_default() && self.directory.get_by_id(tenant).await?.is_none() {
                return Ok(self.record(Decision::new(DecisionBasis::UnknownTenant, None, &request)));
            }
        }

        let roles = self.memberships.get_roles(&principal.username, tenant).await?;
        let grant = role_grant(
            self.memberships.catalog(),
            roles.iter().map(String::as_str),
            permission,
        );

        let decision = match (grant, resource) {
            (None, _) => Decision::new(DecisionBasis::MissingPermission, None, &request),
            (Some(RoleGrant::Wildcard(role)), _) => {
                Decision::new(DecisionBasis::Wildcard, Some(role), &request)
            }
            (Some(RoleGrant::Exact(role)), None) => {
                Decision::new(DecisionBasis::RoleGrant, Some(role), &request)
            }
            (Some(RoleGrant::Exact(role)), Some(resource)) => {
                let basis = self
                    .resource_basis(principal, permission, resource, tenant)
                    .await?;
                Decision::new(basis, Some(role), &request)
            }
        };

        Ok(self.record(decision))
    }

    async fn resource_basis(
        &self,
        principal: &Principal,
        permission: &Permission,
        resource: &ResourceRef,
        tenant: Option<&TenantId>,
    ) -> Result<DecisionBasis, AuthzError> {
        let owner = self.locator.owner_of(resource).await?;
        if owner.as_deref() == Some(principal.username.as_str()) {
            return Ok(DecisionBasis::Owner);
        }

        let department = principal
            .department
            .as_deref()
            .filter(|d| !d.trim().is_empty());
        if let Some(department) = department {
            let resource_department = self.locator.department_of(resource).await?;
            if resource_department.as_deref() == Some(department) {
                return Ok(DecisionBasis::Department);
            }
        }

        let Some(tenant) = tenant else {
            return Ok(DecisionBasis::NoResourceMatch);
        };

        Ok(match self.overlay.evaluate(tenant, permission, resource, principal) {
            OverlayDecision::Allow => DecisionBasis::OverrideAllow,
            OverlayDecision::Deny => DecisionBasis::OverrideDeny,
            OverlayDecision::NoOpinion => DecisionBasis::NoResourceMatch,
        })
    }

    fn record(&self, decision: Decision) -> Decision {
        if decision.allowed {
            debug!(
                decision_id = %decision.decision_id,
                basis = ?decision.basis,
                role = ?decision.role,
                "access granted"
            );
        } else {
            info!(
                decision_id = %decision.decision_id,
                basis = ?decision.basis,
                role = ?decision.role,
                "access denied"
            );
        }
        decision
    }

    /// Register an override rule for an existing, active tenant.
    #[instrument(skip(self, tenant, rule), fields(tenant_id = %tenant), err)]
    pub async fn add_override_rule(&self, tenant: &TenantId, rule: OverrideRule) -> DomainResult<()> {
        if !self.directory.is_valid(tenant).await? {
            return Err(DomainError::not_found(format!("tenant '{tenant}'")));
        }
        self.overlay.add(tenant, rule)?;
        info!("override rule added");
        Ok(())
    }

    pub fn override_rules(&self, tenant: &TenantId) -> Vec<OverrideRule> {
        self.overlay.rules(tenant)
    }

    pub async fn effective_permissions(
        &self,
        username: &str,
        tenant: Option<&TenantId>,
    ) -> DomainResult<BTreeSet<Permission>> {
        self.memberships.effective_permissions(username, tenant).await
    }
}

impl core::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Authorizer")
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use itsm_auth::{ResourceHandler, RoleCatalog};
    use itsm_infra::{
        InMemoryMembershipRepository, InMemoryResourceTable, InMemoryTenantRepository,
        ResourceColumn,
    };

    use super::*;

    fn authorizer() -> (Authorizer, Arc<InMemoryResourceTable>) {
        let incidents = InMemoryResourceTable::new();
        let locator = ResourceLocator::builder()
            .register(
                "incident",
                ResourceHandler::new(incidents.column(ResourceColumn::Owner))
                    .with_department(incidents.column(ResourceColumn::Department)),
            )
            .build()
            .unwrap();
        let memberships = MembershipStore::new(
            Arc::new(InMemoryMembershipRepository::new()),
            Arc::new(RoleCatalog::standard()),
        );
        let directory = Arc::new(TenantDirectory::new(Arc::new(InMemoryTenantRepository::new())));
        (
            Authorizer::new(
                memberships,
                Arc::new(locator),
                Arc::new(RuleOverlay::new()),
                directory,
            ),
            incidents,
        )
    }

    #[tokio::test]
    async fn blank_permission_is_an_error_for_check_and_false_for_is_allowed() {
        let (authz, _) = authorizer();
        let alice = Principal::new("alice");
        let blank = Permission::new("");

        assert!(matches!(
            authz.check(&alice, &blank, None, None).await,
            Err(AuthzError::Validation(_))
        ));
        assert!(!authz.is_allowed(&alice, &blank, None, None).await);
    }

    #[tokio::test]
    async fn missing_permission_never_reads_the_resource() {
        let (authz, incidents) = authorizer();
        incidents.insert("INC-1", Some("alice"), None).unwrap();
        authz.memberships.assign("alice", "viewer", None).await.unwrap();

        let decision = authz
            .check(
                &Principal::new("alice"),
                &Permission::new("incidents.update"),
                Some(&ResourceRef::new("incident", "INC-1")),
                None,
            )
            .await
            .unwrap();
        assert_eq!(decision.basis, DecisionBasis::MissingPermission);
        assert_eq!(decision.role, None);
    }

    #[tokio::test]
    async fn global_context_skips_the_overlay() {
        let (authz, incidents) = authorizer();
        incidents.insert("INC-2", Some("carol"), Some("HR")).unwrap();
        authz.memberships.assign("bob", "analyst", None).await.unwrap();

        let decision = authz
            .check(
                &Principal::new("bob").with_department("IT"),
                &Permission::new("incidents.update"),
                Some(&ResourceRef::new("incident", "INC-2")),
                None,
            )
            .await
            .unwrap();
        assert_eq!(decision.basis, DecisionBasis::NoResourceMatch);
        assert_eq!(decision.role.as_deref(), Some("analyst"));
    }

    #[tokio::test]
    async fn blank_department_never_matches() {
        let (authz, incidents) = authorizer();
        incidents.insert("INC-3", Some("carol"), Some("")).unwrap();
        authz.memberships.assign("bob", "analyst", None).await.unwrap();

        for department in ["", "  "] {
            let decision = authz
                .check(
                    &Principal::new("bob").with_department(department),
                    &Permission::new("incidents.update"),
                    Some(&ResourceRef::new("incident", "INC-3")),
                    None,
                )
                .await
                .unwrap();
            assert_eq!(decision.basis, DecisionBasis::NoResourceMatch);
        }
    }

    #[tokio::test]
    async fn override_rules_require_a_known_tenant() {
        let (authz, _) = authorizer();
        let ghost = TenantId::parse("ghost").unwrap();
        let rule = OverrideRule::allow("incidents.update", ResourceRef::new("incident", "INC-1"))
            .for_users(["bob"]);

        let err = authz.add_override_rule(&ghost, rule.clone()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let default = TenantId::default_tenant();
        authz.add_override_rule(&default, rule).await.unwrap();
        assert_eq!(authz.override_rules(&default).len(), 1);
    }
}
