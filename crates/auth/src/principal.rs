use serde::{Deserialize, Serialize};

use itsm_core::{DomainError, TenantId};

/// An already-authenticated caller.
///
/// Authentication happens upstream; everything here is trusted as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub department: Option<String>,
    /// Tenant carried by the caller's credentials, if any.
    pub tenant_claim: Option<TenantId>,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            department: None,
            tenant_claim: None,
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_tenant_claim(mut self, tenant: TenantId) -> Self {
        self.tenant_claim = Some(tenant);
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        validate_username(&self.username)
    }
}

pub(crate) fn validate_username(username: &str) -> Result<(), DomainError> {
    if username.trim().is_empty() {
        return Err(DomainError::validation("username is empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_optional_attributes() {
        let acme = TenantId::parse("acme").unwrap();
        let p = Principal::new("alice")
            .with_department("IT")
            .with_tenant_claim(acme.clone());

        assert_eq!(p.department.as_deref(), Some("IT"));
        assert_eq!(p.tenant_claim, Some(acme));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn blank_username_is_invalid() {
        assert!(Principal::new(" ").validate().is_err());
    }
}
