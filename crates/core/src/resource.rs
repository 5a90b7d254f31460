//! Resource references (`type:id`) used by resource-scoped checks.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Reference to a single resource, e.g. `incident:INC-1`.
///
/// Constructed per call; it says nothing about whether the resource exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource_type: String,
    pub resource_id: String,
}

impl ResourceRef {
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }

    /// Parse the textual `type:id` form.
    ///
    /// Only the first `:` separates the two halves. Everything after it is the
    /// id, colons included: `asset:rack:42` is asset `rack:42`, not `rack`.
    /// Both halves are trimmed and must be non-empty.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let (resource_type, resource_id) = value
            .split_once(':')
            .ok_or_else(|| DomainError::validation(format!("resource '{value}' is not type:id")))?;
        let reference = Self::new(resource_type.trim(), resource_id.trim());
        reference.validate()?;
        Ok(reference)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.resource_type.is_empty() {
            return Err(DomainError::validation("resource type is empty"));
        }
        if self.resource_id.is_empty() {
            return Err(DomainError::validation("resource id is empty"));
        }
        Ok(())
    }
}

impl core::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_and_id() {
        let r = ResourceRef::parse("incident:INC-1").unwrap();
        assert_eq!(r.resource_type, "incident");
        assert_eq!(r.resource_id, "INC-1");
        assert_eq!(r.to_string(), "incident:INC-1");
    }

    #[test]
    fn id_keeps_later_colons() {
        let r = ResourceRef::parse("asset:rack:42").unwrap();
        assert_eq!(r.resource_id, "rack:42");
    }

    #[test]
    fn malformed_refs_are_validation_errors() {
        for bad in ["incident", ":INC-1", "incident:", ""] {
            assert!(
                matches!(ResourceRef::parse(bad), Err(DomainError::Validation(_))),
                "{bad:?}"
            );
        }
    }
}
