//! Versioned definition of the per-tenant data partition.
//!
//! Every tenant gets the same fixed set of collections. Provisioning is
//! "create if not exists", so replaying it for an existing tenant is a no-op.

use serde::Serialize;

/// Current partition layout version.
pub const PARTITION_SCHEMA_VERSION: u32 = 1;

/// A column of a partition collection, as a SQL fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: &'static str,
}

/// One tenant-scoped table / collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
}

const fn col(name: &'static str, sql_type: &'static str) -> ColumnSpec {
    ColumnSpec { name, sql_type }
}

const INCIDENTS: CollectionSpec = CollectionSpec {
    name: "incidents",
    columns: &[
        col("id", "BIGSERIAL PRIMARY KEY"),
        col("ticket_id", "TEXT UNIQUE"),
        col("title", "TEXT NOT NULL"),
        col("priority", "TEXT"),
        col("status", "TEXT"),
        col("description", "TEXT"),
        col("is_security_incident", "BOOLEAN NOT NULL DEFAULT FALSE"),
        col("created_by", "TEXT"),
        col("assignee", "TEXT"),
        col("department", "TEXT"),
        col("created_at", "TIMESTAMPTZ NOT NULL DEFAULT NOW()"),
        col("updated_at", "TIMESTAMPTZ NOT NULL DEFAULT NOW()"),
    ],
};

const ASSETS: CollectionSpec = CollectionSpec {
    name: "assets",
    columns: &[
        col("id", "BIGSERIAL PRIMARY KEY"),
        col("asset_tag", "TEXT UNIQUE"),
        col("name", "TEXT NOT NULL"),
        col("type", "TEXT"),
        col("criticality", "INTEGER NOT NULL DEFAULT 3"),
        col("status", "TEXT NOT NULL DEFAULT 'Operational'"),
        col("department", "TEXT"),
        col("owner", "TEXT"),
        col("created_at", "TIMESTAMPTZ NOT NULL DEFAULT NOW()"),
        col("updated_at", "TIMESTAMPTZ NOT NULL DEFAULT NOW()"),
    ],
};

const AUDIT_LOGS: CollectionSpec = CollectionSpec {
    name: "audit_logs",
    columns: &[
        col("id", "BIGSERIAL PRIMARY KEY"),
        col("username", "TEXT"),
        col("action", "TEXT"),
        col("resource", "TEXT"),
        col("resource_id", "TEXT"),
        col("details", "TEXT"),
        col("ip_address", "TEXT"),
        col("timestamp", "TIMESTAMPTZ NOT NULL DEFAULT NOW()"),
    ],
};

/// Ordered set of collections making up a tenant partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionSchema {
    pub version: u32,
    pub collections: Vec<CollectionSpec>,
}

impl PartitionSchema {
    /// The layout provisioned for new tenants.
    pub fn current() -> Self {
        Self {
            version: PARTITION_SCHEMA_VERSION,
            collections: vec![INCIDENTS, ASSETS, AUDIT_LOGS],
        }
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }
}

impl Default for PartitionSchema {
    fn default() -> Self {
        Self::current()
    }
}
