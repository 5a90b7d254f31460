//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Literal id of the sentinel tenant used when nothing else resolves.
pub const DEFAULT_TENANT: &str = "default";

const MAX_TENANT_ID_LEN: usize = 63;

/// Identifier of a tenant (multi-tenant boundary).
///
/// Tenant ids are slugs: 1-63 characters of lowercase ASCII letters, digits,
/// `-` or `_`, starting with a letter or digit. They double as partition
/// names, so nothing else is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::invalid_id("TenantId: empty"));
        }
        if value.len() > MAX_TENANT_ID_LEN {
            return Err(DomainError::invalid_id(format!(
                "TenantId: longer than {MAX_TENANT_ID_LEN} characters"
            )));
        }
        let mut chars = value.chars();
        let first_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
        let rest_ok = value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !first_ok || !rest_ok {
            return Err(DomainError::invalid_id(format!(
                "TenantId: '{value}' is not a lowercase slug"
            )));
        }
        Ok(Self(value))
    }

    /// The sentinel tenant.
    pub fn default_tenant() -> Self {
        Self(DEFAULT_TENANT.to_string())
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_TENANT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TenantId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_slugs() {
        for ok in ["acme", "acme-corp", "tenant_01", "9lives"] {
            assert!(TenantId::parse(ok).is_ok(), "{ok} should parse");
        }
    }

    #[test]
    fn rejects_non_slugs() {
        for bad in ["", "Acme", "-acme", "acme corp", "acme;drop", "ü"] {
            assert!(
                matches!(TenantId::parse(bad), Err(DomainError::InvalidId(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(TenantId::parse("a".repeat(64)).is_err());
    }

    #[test]
    fn default_sentinel() {
        let id = TenantId::default_tenant();
        assert!(id.is_default());
        assert_eq!(id.as_str(), "default");
        assert!(!TenantId::parse("acme").unwrap().is_default());
    }

    #[test]
    fn serde_goes_through_validation() {
        let id: TenantId = serde_json::from_str("\"acme\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"acme\"");
        assert!(serde_json::from_str::<TenantId>("\"NOT OK\"").is_err());
    }
}
