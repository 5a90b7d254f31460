//! Per-tenant explicit allow/deny rules for specific resources.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use itsm_core::{DomainError, ResourceRef, StorageError, TenantId};

use crate::{Permission, Principal};

/// An explicit decision for one (permission, resource) pair, scoped to a set
/// of users and/or departments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRule {
    pub permission: Permission,
    pub resource: ResourceRef,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub departments: Vec<String>,
    pub allowed: bool,
}

impl OverrideRule {
    pub fn allow(permission: impl Into<Permission>, resource: ResourceRef) -> Self {
        Self::new(permission, resource, true)
    }

    pub fn deny(permission: impl Into<Permission>, resource: ResourceRef) -> Self {
        Self::new(permission, resource, false)
    }

    fn new(permission: impl Into<Permission>, resource: ResourceRef, allowed: bool) -> Self {
        Self {
            permission: permission.into(),
            resource,
            users: Vec::new(),
            departments: Vec::new(),
            allowed,
        }
    }

    pub fn for_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users.extend(users.into_iter().map(Into::into));
        self
    }

    pub fn for_departments<I, S>(mut self, departments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.departments.extend(departments.into_iter().map(Into::into));
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.permission.validate()?;
        self.resource.validate()
    }

    /// Same permission and resource, and the principal is named either by
    /// username or by department.
    pub fn matches(&self, permission: &Permission, resource: &ResourceRef, principal: &Principal) -> bool {
        if &self.permission != permission || &self.resource != resource {
            return false;
        }
        let user_match = self.users.iter().any(|u| u == &principal.username);
        let department_match = principal
            .department
            .as_ref()
            .is_some_and(|d| self.departments.contains(d));
        user_match || department_match
    }
}

/// Outcome of evaluating the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayDecision {
    Allow,
    Deny,
    NoOpinion,
}

/// In-process rule lists, one per tenant. Rules live for the lifetime of the
/// process and cannot be removed.
#[derive(Debug, Default)]
pub struct RuleOverlay {
    rules: RwLock<HashMap<TenantId, Vec<OverrideRule>>>,
}

impl RuleOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `rule` to the tenant's list. Tenant validity is the caller's
    /// concern.
    pub fn add(&self, tenant: &TenantId, rule: OverrideRule) -> Result<(), DomainError> {
        rule.validate()?;
        let mut rules = self
            .rules
            .write()
            .map_err(|_| StorageError::backend("override rules lock poisoned"))?;
        rules.entry(tenant.clone()).or_default().push(rule);
        Ok(())
    }

    /// First matching rule in registration order decides.
    pub fn evaluate(
        &self,
        tenant: &TenantId,
        permission: &Permission,
        resource: &ResourceRef,
        principal: &Principal,
    ) -> OverlayDecision {
        let Ok(rules) = self.rules.read() else {
            return OverlayDecision::NoOpinion;
        };

        rules
            .get(tenant)
            .and_then(|list| list.iter().find(|r| r.matches(permission, resource, principal)))
            .map_or(OverlayDecision::NoOpinion, |rule| {
                if rule.allowed {
                    OverlayDecision::Allow
                } else {
                    OverlayDecision::Deny
                }
            })
    }

    /// Snapshot of the tenant's rules in registration order.
    pub fn rules(&self, tenant: &TenantId) -> Vec<OverrideRule> {
        self.rules
            .read()
            .map(|rules| rules.get(tenant).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> TenantId {
        TenantId::parse("acme").unwrap()
    }

    fn inc() -> ResourceRef {
        ResourceRef::new("incident", "INC-7")
    }

    #[test]
    fn no_rules_means_no_opinion() {
        let overlay = RuleOverlay::new();
        let p = Principal::new("bob");
        assert_eq!(
            overlay.evaluate(&acme(), &Permission::new("incidents.update"), &inc(), &p),
            OverlayDecision::NoOpinion
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let overlay = RuleOverlay::new();
        overlay
            .add(&acme(), OverrideRule::deny("incidents.update", inc()).for_users(["bob"]))
            .unwrap();
        overlay
            .add(&acme(), OverrideRule::allow("incidents.update", inc()).for_users(["bob"]))
            .unwrap();

        let p = Principal::new("bob");
        assert_eq!(
            overlay.evaluate(&acme(), &Permission::new("incidents.update"), &inc(), &p),
            OverlayDecision::Deny
        );
        assert_eq!(overlay.rules(&acme()).len(), 2);
    }

    #[test]
    fn department_rules_need_a_known_department() {
        let overlay = RuleOverlay::new();
        overlay
            .add(
                &acme(),
                OverrideRule::allow("incidents.update", inc()).for_departments(["Finance"]),
            )
            .unwrap();

        let perm = Permission::new("incidents.update");
        let without = Principal::new("carol");
        let with = Principal::new("carol").with_department("Finance");
        assert_eq!(overlay.evaluate(&acme(), &perm, &inc(), &without), OverlayDecision::NoOpinion);
        assert_eq!(overlay.evaluate(&acme(), &perm, &inc(), &with), OverlayDecision::Allow);
    }

    #[test]
    fn rules_are_tenant_scoped() {
        let overlay = RuleOverlay::new();
        overlay
            .add(&acme(), OverrideRule::allow("incidents.update", inc()).for_users(["bob"]))
            .unwrap();

        let globex = TenantId::parse("globex").unwrap();
        let p = Principal::new("bob");
        assert_eq!(
            overlay.evaluate(&globex, &Permission::new("incidents.update"), &inc(), &p),
            OverlayDecision::NoOpinion
        );
        assert!(overlay.rules(&globex).is_empty());
    }

    #[test]
    fn concurrent_adds_keep_each_writers_order() {
        const WRITERS: usize = 4;
        const USERS_PER_WRITER: usize = 50;

        let overlay = RuleOverlay::new();
        let perm = Permission::new("incidents.update");
        let user = |w: usize, i: usize| format!("w{w}-u{i}");

        std::thread::scope(|scope| {
            for w in 0..WRITERS {
                let overlay = &overlay;
                scope.spawn(move || {
                    for i in 0..USERS_PER_WRITER {
                        overlay
                            .add(&acme(), OverrideRule::deny("incidents.update", inc()).for_users([user(w, i)]))
                            .unwrap();
                        overlay
                            .add(&acme(), OverrideRule::allow("incidents.update", inc()).for_users([user(w, i)]))
                            .unwrap();
                    }
                });
            }

            // Each user's deny is registered before their allow, so a reader
            // must never observe Allow.
            for w in 0..WRITERS {
                let (overlay, perm) = (&overlay, &perm);
                scope.spawn(move || {
                    for round in 0..200 {
                        let p = Principal::new(user(w, round % USERS_PER_WRITER));
                        assert_ne!(overlay.evaluate(&acme(), perm, &inc(), &p), OverlayDecision::Allow);
                    }
                });
            }
        });

        let rules = overlay.rules(&acme());
        assert_eq!(rules.len(), WRITERS * USERS_PER_WRITER * 2);
        for w in 0..WRITERS {
            let prefix = format!("w{w}-");
            let own: Vec<_> = rules
                .iter()
                .filter(|r| r.users[0].starts_with(&prefix))
                .map(|r| (r.users[0].clone(), r.allowed))
                .collect();
            let expected: Vec<_> = (0..USERS_PER_WRITER)
                .flat_map(|i| [(user(w, i), false), (user(w, i), true)])
                .collect();
            assert_eq!(own, expected);
        }
        for w in 0..WRITERS {
            let p = Principal::new(user(w, 0));
            assert_eq!(overlay.evaluate(&acme(), &perm, &inc(), &p), OverlayDecision::Deny);
        }
    }

    #[test]
    fn malformed_rules_are_rejected() {
        let overlay = RuleOverlay::new();
        let err = overlay
            .add(&acme(), OverrideRule::allow("", inc()))
            .unwrap_err();
        assert!(err.is_validation());
    }
}
