//! Tenant lookups and request-to-tenant resolution.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, instrument, warn};

use itsm_core::{DomainError, DomainResult, StorageError, Tenant, TenantId, TenantRepository};

use crate::resolve::{ResolutionContext, ResolutionSource};

/// The outcome of [`TenantDirectory::require`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTenant {
    pub id: TenantId,
    pub source: ResolutionSource,
    /// `None` only for the default tenant.
    pub tenant: Option<Tenant>,
}

/// Resolves tenants and caches active tenant records by id.
///
/// The cache is never refreshed on its own: entries stay until
/// [`invalidate`](Self::invalidate) is called, which provisioning, settings
/// updates and deactivation do. Inactive tenants are never cached.
pub struct TenantDirectory {
    repo: Arc<dyn TenantRepository>,
    cache: RwLock<TenantCache>,
    base_domain: Option<String>,
}

/// Active tenants by id, plus a counter bumped by every invalidation.
///
/// A lookup only fills the cache if no invalidation happened while it was
/// reading the store, so a row read before a deactivation is never cached
/// after it.
#[derive(Default)]
struct TenantCache {
    entries: HashMap<TenantId, Tenant>,
    generation: u64,
}

fn poisoned() -> StorageError {
    StorageError::backend("tenant cache lock poisoned")
}

impl TenantDirectory {
    pub fn new(repo: Arc<dyn TenantRepository>) -> Self {
        Self {
            repo,
            cache: RwLock::new(TenantCache::default()),
            base_domain: None,
        }
    }

    /// Suffix appended to a subdomain before the domain lookup.
    pub fn with_base_domain(mut self, base_domain: Option<String>) -> Self {
        self.base_domain = base_domain
            .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty());
        self
    }

    pub async fn resolve(&self, ctx: &ResolutionContext) -> DomainResult<TenantId> {
        Ok(self.resolve_with_source(ctx).await?.0)
    }

    /// Explicit header, then subdomain, then principal claim, then `default`.
    #[instrument(skip(self, ctx), err)]
    pub async fn resolve_with_source(
        &self,
        ctx: &ResolutionContext,
    ) -> DomainResult<(TenantId, ResolutionSource)> {
        if let Some(explicit) = ctx.explicit() {
            let id = TenantId::parse(explicit)?;
            return Ok((id, ResolutionSource::Explicit));
        }

        if let Some(subdomain) = ctx.subdomain() {
            let domain = self.domain_for(subdomain);
            match self.get_by_domain(&domain).await? {
                Some(tenant) => return Ok((tenant.id, ResolutionSource::Subdomain)),
                None => debug!(%domain, "no active tenant for domain"),
            }
        }

        if let Some(claim) = &ctx.claim {
            return Ok((claim.clone(), ResolutionSource::Claim));
        }

        Ok((TenantId::default_tenant(), ResolutionSource::Default))
    }

    /// Active tenant by id, served from the cache when possible.
    #[instrument(skip(self, id), fields(tenant_id = %id), err)]
    pub async fn get_by_id(&self, id: &TenantId) -> DomainResult<Option<Tenant>> {
        let generation = {
            let cache = self.cache.read().map_err(|_| poisoned())?;
            if let Some(tenant) = cache.entries.get(id) {
                return Ok(Some(tenant.clone()));
            }
            cache.generation
        };

        let tenant = match self.repo.find_by_id(id).await? {
            Some(tenant) if tenant.is_active() => tenant,
            Some(_) => {
                debug!("tenant is inactive");
                return Ok(None);
            }
            None => return Ok(None),
        };

        let mut cache = self.cache.write().map_err(|_| poisoned())?;
        if cache.generation == generation {
            cache.entries.insert(id.clone(), tenant.clone());
        } else {
            debug!("cache invalidated during lookup, not caching");
        }
        Ok(Some(tenant))
    }

    /// Active tenant by domain. Always read from the store.
    pub async fn get_by_domain(&self, domain: &str) -> DomainResult<Option<Tenant>> {
        let domain = domain.trim().to_ascii_lowercase();
        if domain.is_empty() {
            return Ok(None);
        }
        Ok(self.repo.find_active_by_domain(&domain).await?)
    }

    /// Resolve and check that the tenant exists and is active. The default
    /// tenant always passes.
    pub async fn require(&self, ctx: &ResolutionContext) -> DomainResult<ResolvedTenant> {
        let (id, source) = self.resolve_with_source(ctx).await?;
        if id.is_default() {
            return Ok(ResolvedTenant {
                id,
                source,
                tenant: None,
            });
        }

        match self.get_by_id(&id).await? {
            Some(tenant) => Ok(ResolvedTenant {
                id,
                source,
                tenant: Some(tenant),
            }),
            None => {
                warn!(tenant_id = %id, ?source, "tenant not found");
                Err(DomainError::not_found(format!("tenant '{id}'")))
            }
        }
    }

    pub async fn is_valid(&self, id: &TenantId) -> DomainResult<bool> {
        if id.is_default() {
            return Ok(true);
        }
        Ok(self.get_by_id(id).await?.is_some())
    }

    pub fn invalidate(&self, id: &TenantId) {
        let mut cache = match self.cache.write() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.entries.remove(id);
        cache.generation = cache.generation.wrapping_add(1);
    }

    fn domain_for(&self, subdomain: &str) -> String {
        let subdomain = subdomain.to_ascii_lowercase();
        match &self.base_domain {
            Some(base) => format!("{subdomain}.{base}"),
            None => subdomain,
        }
    }
}

impl core::fmt::Debug for TenantDirectory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TenantDirectory")
            .field("base_domain", &self.base_domain)
            .finish_non_exhaustive()
    }
}
