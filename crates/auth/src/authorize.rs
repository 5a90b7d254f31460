use serde::Serialize;
use thiserror::Error;

use itsm_core::{DomainError, StorageError};

use crate::{Permission, RoleCatalog};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// The request itself was malformed (empty username, blank permission, ...).
    #[error("invalid authorization request: {0}")]
    Validation(String),

    /// A collaborator failed while the decision was being computed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<DomainError> for AuthzError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Storage(e) => Self::Storage(e),
            other => Self::Validation(other.to_string()),
        }
    }
}

/// How a role set satisfied a permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "role", rename_all = "snake_case")]
pub enum RoleGrant {
    /// A role holds `*`. Resource attributes are never consulted.
    Wildcard(String),
    /// A role holds the exact permission.
    Exact(String),
}

impl RoleGrant {
    pub fn role(&self) -> &str {
        match self {
            Self::Wildcard(role) | Self::Exact(role) => role,
        }
    }
}

/// Pure role gate: no IO, no resource attributes.
///
/// Any wildcard role wins over exact grants. Unknown roles contribute
/// nothing.
pub fn role_grant<'a, I>(catalog: &RoleCatalog, roles: I, required: &Permission) -> Option<RoleGrant>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut exact = None;
    for role in roles {
        let permissions = catalog.permissions(role);
        if permissions.iter().any(Permission::is_wildcard) {
            return Some(RoleGrant::Wildcard(role.to_string()));
        }
        if exact.is_none() && permissions.contains(required) {
            exact = Some(RoleGrant::Exact(role.to_string()));
        }
    }
    exact
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wildcard_beats_exact() {
        let catalog = RoleCatalog::standard();
        let grant = role_grant(
            &catalog,
            ["analyst", "super_admin"],
            &Permission::new("incidents.update"),
        );
        assert_eq!(grant, Some(RoleGrant::Wildcard("super_admin".into())));
    }

    #[test]
    fn exact_grant_names_the_role() {
        let catalog = RoleCatalog::standard();
        let grant = role_grant(&catalog, ["viewer"], &Permission::new("incidents.view"));
        assert_eq!(grant.as_ref().map(RoleGrant::role), Some("viewer"));
        assert!(matches!(grant, Some(RoleGrant::Exact(_))));
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        let catalog = RoleCatalog::standard();
        assert_eq!(role_grant(&catalog, ["root"], &Permission::new("incidents.view")), None);
        assert_eq!(role_grant(&catalog, Vec::<&str>::new(), &Permission::new("incidents.view")), None);
    }

    #[test]
    fn storage_errors_survive_conversion() {
        let err: AuthzError = DomainError::from(StorageError::Unavailable("pool".into())).into();
        assert!(matches!(err, AuthzError::Storage(_)));

        let err: AuthzError = DomainError::validation("username is empty").into();
        assert!(matches!(err, AuthzError::Validation(_)));
    }

    proptest! {
        #[test]
        fn wildcard_grants_any_permission(perm in "[a-z_]{1,12}\\.[a-z]{1,8}") {
            let catalog = RoleCatalog::standard();
            let grant = role_grant(&catalog, ["super_admin"], &Permission::new(perm));
            prop_assert!(matches!(grant, Some(RoleGrant::Wildcard(_))));
        }

        #[test]
        fn non_wildcard_roles_only_grant_listed_permissions(
            role in prop::sample::select(vec!["admin", "manager", "analyst", "viewer", "user"]),
            perm in "[a-z_]{1,12}\\.[a-z]{1,8}",
        ) {
            let catalog = RoleCatalog::standard();
            let permission = Permission::new(perm);
            let granted = role_grant(&catalog, [role], &permission).is_some();
            prop_assert_eq!(granted, catalog.permissions(role).contains(&permission));
        }
    }
}
