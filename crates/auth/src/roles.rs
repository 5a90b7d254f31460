use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use itsm_core::DomainError;

use crate::Permission;

/// Role identifier used for RBAC (e.g. `analyst`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named, code-defined bundle of permissions.
///
/// `level` orders roles for display only; a higher level implies nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    pub key: Role,
    pub display_name: Cow<'static, str>,
    pub level: u8,
    pub description: Cow<'static, str>,
    pub permissions: BTreeSet<Permission>,
}

impl RoleDefinition {
    pub fn new(
        key: impl Into<Cow<'static, str>>,
        display_name: impl Into<Cow<'static, str>>,
        level: u8,
    ) -> Self {
        Self {
            key: Role::new(key),
            display_name: display_name.into(),
            level,
            description: Cow::Borrowed(""),
            permissions: BTreeSet::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = description.into();
        self
    }

    pub fn grant<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn has_wildcard(&self) -> bool {
        self.permissions.iter().any(Permission::is_wildcard)
    }
}

/// Role as shown to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDescriptor {
    pub key: String,
    pub display_name: String,
    pub level: u8,
    pub description: String,
    pub permissions: Vec<String>,
}

/// Permission as shown to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

const PERMISSION_DESCRIPTIONS: &[(&str, &str)] = &[
    ("users.manage", "Manage users"),
    ("roles.manage", "Manage roles"),
    ("incidents.manage", "Manage incidents"),
    ("incidents.create", "Create incidents"),
    ("incidents.update", "Update incidents"),
    ("incidents.view", "View incidents"),
    ("problems.manage", "Manage problems"),
    ("problems.create", "Create problems"),
    ("problems.update", "Update problems"),
    ("problems.view", "View problems"),
    ("changes.manage", "Manage changes"),
    ("changes.create", "Create changes"),
    ("changes.update", "Update changes"),
    ("changes.view", "View changes"),
    ("releases.manage", "Manage releases"),
    ("releases.view", "View releases"),
    ("assets.manage", "Manage assets"),
    ("assets.view", "View assets"),
    ("vulnerabilities.manage", "Manage vulnerabilities"),
    ("vulnerabilities.view", "View vulnerabilities"),
    ("compliance.manage", "Manage compliance"),
    ("reports.view", "View reports"),
    ("security.view", "View security dashboards"),
    ("audit.view", "View audit logs"),
    ("integrations.manage", "Manage integrations"),
    ("service_requests.create", "Create service requests"),
    ("knowledge.view", "View knowledge base"),
];

/// Static role → permission registry.
///
/// Immutable once built: privilege semantics change only with a deployment,
/// while *who* holds a role lives in the membership store.
#[derive(Debug, Clone)]
pub struct RoleCatalog {
    roles: BTreeMap<String, RoleDefinition>,
}

static NO_PERMISSIONS: BTreeSet<Permission> = BTreeSet::new();

impl RoleCatalog {
    /// Build a catalog from explicit definitions. Duplicate keys are rejected.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = RoleDefinition>,
    ) -> Result<Self, DomainError> {
        let mut roles = BTreeMap::new();
        for definition in definitions {
            let key = definition.key.as_str().to_string();
            if key.trim().is_empty() {
                return Err(DomainError::validation("role key is empty"));
            }
            if roles.insert(key.clone(), definition).is_some() {
                return Err(DomainError::validation(format!("role '{key}' defined twice")));
            }
        }
        Ok(Self { roles })
    }

    /// The six ITSM roles.
    pub fn standard() -> Self {
        let definitions = [
            RoleDefinition::new("super_admin", "Super Administrator", 100)
                .describe("Holds every permission")
                .grant(["*"]),
            RoleDefinition::new("admin", "Administrator", 80)
                .describe("System administrator")
                .grant([
                    "users.manage",
                    "roles.manage",
                    "incidents.manage",
                    "problems.manage",
                    "changes.manage",
                    "releases.manage",
                    "assets.manage",
                    "vulnerabilities.manage",
                    "compliance.manage",
                    "reports.view",
                    "security.view",
                    "audit.view",
                    "integrations.manage",
                ]),
            RoleDefinition::new("manager", "Manager", 60)
                .describe("Department manager")
                .grant([
                    "incidents.manage",
                    "problems.manage",
                    "changes.manage",
                    "releases.manage",
                    "assets.view",
                    "vulnerabilities.view",
                    "reports.view",
                    "security.view",
                    "audit.view",
                ]),
            RoleDefinition::new("analyst", "Analyst", 40)
                .describe("IT analyst")
                .grant([
                    "incidents.create",
                    "incidents.update",
                    "problems.create",
                    "problems.update",
                    "changes.create",
                    "changes.update",
                    "assets.view",
                    "vulnerabilities.view",
                    "reports.view",
                ]),
            RoleDefinition::new("viewer", "Viewer", 20)
                .describe("Read-only user")
                .grant([
                    "incidents.view",
                    "problems.view",
                    "changes.view",
                    "releases.view",
                    "assets.view",
                    "vulnerabilities.view",
                    "reports.view",
                    "security.view",
                ]),
            RoleDefinition::new("user", "End User", 10)
                .describe("End user")
                .grant(["incidents.create", "service_requests.create", "knowledge.view"]),
        ];

        Self {
            roles: definitions
                .into_iter()
                .map(|d| (d.key.as_str().to_string(), d))
                .collect(),
        }
    }

    /// Permissions of `role`; the empty set for unknown roles.
    pub fn permissions(&self, role: &str) -> &BTreeSet<Permission> {
        self.roles
            .get(role)
            .map(|d| &d.permissions)
            .unwrap_or(&NO_PERMISSIONS)
    }

    pub fn get(&self, role: &str) -> Option<&RoleDefinition> {
        self.roles.get(role)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    /// All roles, highest level first.
    pub fn list_roles(&self) -> Vec<RoleDescriptor> {
        let mut roles: Vec<RoleDescriptor> = self
            .roles
            .values()
            .map(|d| RoleDescriptor {
                key: d.key.as_str().to_string(),
                display_name: d.display_name.to_string(),
                level: d.level,
                description: d.description.to_string(),
                permissions: d.permissions.iter().map(|p| p.as_str().to_string()).collect(),
            })
            .collect();
        roles.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.key.cmp(&b.key)));
        roles
    }

    pub fn describe_permission(&self, permission: &str) -> Option<&'static str> {
        if permission == crate::permissions::WILDCARD {
            return Some("Wildcard permission - grants all permissions");
        }
        PERMISSION_DESCRIPTIONS
            .iter()
            .find(|(name, _)| *name == permission)
            .map(|(_, description)| *description)
    }

    /// Every permission mentioned by a role or by the description table.
    pub fn known_permissions(&self) -> Vec<PermissionDescriptor> {
        let mut names: BTreeSet<&str> = PERMISSION_DESCRIPTIONS.iter().map(|(n, _)| *n).collect();
        for definition in self.roles.values() {
            names.extend(definition.permissions.iter().map(Permission::as_str));
        }

        names
            .into_iter()
            .map(|name| PermissionDescriptor {
                name: name.to_string(),
                description: self.describe_permission(name).map(str::to_string),
                category: permission_category(name).map(str::to_string),
            })
            .collect()
    }
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn permission_category(permission: &str) -> Option<&str> {
    if permission == crate::permissions::WILDCARD {
        return Some("system");
    }
    permission.split('.').next().filter(|s| !s.is_empty())
}
