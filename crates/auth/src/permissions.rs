use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use itsm_core::DomainError;

/// Token granting every permission check.
pub const WILDCARD: &str = "*";

/// Permission identifier.
///
/// Permissions are opaque `"<domain>.<verb>"` strings (e.g. `incidents.update`).
/// The special wildcard `"*"` grants everything. There is no registry of valid
/// permissions beyond what the role catalog mentions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Build a permission from caller input, rejecting blank tokens.
    pub fn parse(name: impl Into<Cow<'static, str>>) -> Result<Self, DomainError> {
        let permission = Self::new(name);
        permission.validate()?;
        Ok(permission)
    }

    pub fn wildcard() -> Self {
        Self::new(WILDCARD)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == WILDCARD
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.0.trim().is_empty() {
            return Err(DomainError::validation("permission is empty"));
        }
        Ok(())
    }

    /// The `<domain>` half, e.g. `incidents` for `incidents.update`.
    pub fn domain(&self) -> Option<&str> {
        self.as_str().split_once('.').map(|(domain, _)| domain)
    }

    /// The `<verb>` half, e.g. `update` for `incidents.update`.
    pub fn verb(&self) -> Option<&str> {
        self.as_str().rsplit_once('.').map(|(_, verb)| verb)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Permission {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
