use serde::Serialize;

use itsm_auth::Principal;
use itsm_core::TenantId;

/// Request inputs that can name a tenant, in decreasing precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionContext {
    /// Raw value of an explicit tenant header (e.g. `X-Tenant-ID`).
    pub explicit: Option<String>,
    /// First label of the request host.
    pub subdomain: Option<String>,
    /// Tenant carried by the authenticated principal.
    pub claim: Option<TenantId>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_explicit(mut self, value: impl Into<String>) -> Self {
        self.explicit = Some(value.into());
        self
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    pub fn with_claim(mut self, tenant: TenantId) -> Self {
        self.claim = Some(tenant);
        self
    }

    /// Takes the tenant claim from the principal.
    pub fn for_principal(mut self, principal: &Principal) -> Self {
        self.claim = principal.tenant_claim.clone();
        self
    }

    pub(crate) fn explicit(&self) -> Option<&str> {
        self.explicit.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub(crate) fn subdomain(&self) -> Option<&str> {
        self.subdomain.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Which input decided the tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Explicit,
    Subdomain,
    Claim,
    Default,
}
