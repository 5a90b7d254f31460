//! Typed owner / department lookups for resources.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use itsm_core::{AttributeLookup, DomainError, ResourceRef, StorageResult};

/// Lookups registered for one resource type.
#[derive(Clone)]
pub struct ResourceHandler {
    owner: Arc<dyn AttributeLookup>,
    department: Option<Arc<dyn AttributeLookup>>,
}

impl ResourceHandler {
    pub fn new(owner: Arc<dyn AttributeLookup>) -> Self {
        Self {
            owner,
            department: None,
        }
    }

    pub fn with_department(mut self, department: Arc<dyn AttributeLookup>) -> Self {
        self.department = Some(department);
        self
    }

    pub fn has_department(&self) -> bool {
        self.department.is_some()
    }
}

/// Resolves resource attributes through a fixed handler map.
///
/// Unregistered types and missing rows both yield `None`; only storage
/// failures are errors.
#[derive(Clone)]
pub struct ResourceLocator {
    handlers: HashMap<String, ResourceHandler>,
}

impl ResourceLocator {
    pub fn builder() -> ResourceLocatorBuilder {
        ResourceLocatorBuilder::default()
    }

    /// A locator with no handlers; every lookup is `None`.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub async fn owner_of(&self, resource: &ResourceRef) -> StorageResult<Option<String>> {
        let lookup = self.handler(resource).map(|h| Arc::clone(&h.owner));
        Self::lookup(lookup, &resource.resource_id).await
    }

    pub async fn department_of(&self, resource: &ResourceRef) -> StorageResult<Option<String>> {
        let lookup = self
            .handler(resource)
            .and_then(|h| h.department.as_ref().map(Arc::clone));
        Self::lookup(lookup, &resource.resource_id).await
    }

    pub fn is_registered(&self, resource_type: &str) -> bool {
        self.handlers.contains_key(resource_type)
    }

    pub fn resource_types(&self) -> BTreeSet<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    fn handler(&self, resource: &ResourceRef) -> Option<&ResourceHandler> {
        let handler = self.handlers.get(&resource.resource_type);
        if handler.is_none() {
            debug!(resource = %resource, "no handler registered for resource type");
        }
        handler
    }

    async fn lookup(
        lookup: Option<Arc<dyn AttributeLookup>>,
        resource_id: &str,
    ) -> StorageResult<Option<String>> {
        match lookup {
            Some(lookup) => {
                let value = lookup.lookup(resource_id).await?;
                if value.is_none() {
                    debug!(resource_id = %resource_id, "resource attribute not found");
                }
                Ok(value)
            }
            None => Ok(None),
        }
    }
}

impl core::fmt::Debug for ResourceLocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResourceLocator")
            .field("resource_types", &self.resource_types())
            .finish()
    }
}

#[derive(Default)]
pub struct ResourceLocatorBuilder {
    handlers: HashMap<String, ResourceHandler>,
    duplicates: Vec<String>,
    required: BTreeSet<String>,
}

impl ResourceLocatorBuilder {
    pub fn register(mut self, resource_type: impl Into<String>, handler: ResourceHandler) -> Self {
        let resource_type = resource_type.into();
        if self.handlers.contains_key(&resource_type) {
            self.duplicates.push(resource_type);
        } else {
            self.handlers.insert(resource_type, handler);
        }
        self
    }

    /// Types that must have a handler for [`build`](Self::build) to succeed.
    pub fn require<I, S>(mut self, resource_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(resource_types.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<ResourceLocator, DomainError> {
        if let Some(duplicate) = self.duplicates.first() {
            return Err(DomainError::validation(format!(
                "resource type '{duplicate}' registered twice"
            )));
        }

        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|t| !self.handlers.contains_key(t.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(DomainError::validation(format!(
                "no handler for resource types: {}",
                missing.join(", ")
            )));
        }

        Ok(ResourceLocator {
            handlers: self.handlers,
        })
    }
}
