use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use itsm_core::{AttributeLookup, StorageError, StorageResult};

/// Attribute column exposed by an [`InMemoryResourceTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceColumn {
    Owner,
    Department,
}

#[derive(Debug, Clone, Default)]
struct ResourceRow {
    owner: Option<String>,
    department: Option<String>,
}

/// In-memory stand-in for one ITSM resource table (incidents, assets, ...).
#[derive(Debug, Default)]
pub struct InMemoryResourceTable {
    rows: RwLock<HashMap<String, ResourceRow>>,
}

impl InMemoryResourceTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(
        &self,
        resource_id: impl Into<String>,
        owner: Option<&str>,
        department: Option<&str>,
    ) -> StorageResult<()> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        rows.insert(
            resource_id.into(),
            ResourceRow {
                owner: owner.map(str::to_string),
                department: department.map(str::to_string),
            },
        );
        Ok(())
    }

    /// A lookup reading one column of this table.
    pub fn column(self: &Arc<Self>, column: ResourceColumn) -> Arc<dyn AttributeLookup> {
        Arc::new(ColumnLookup {
            table: Arc::clone(self),
            column,
        })
    }
}

fn poisoned() -> StorageError {
    StorageError::backend("resource table lock poisoned")
}

struct ColumnLookup {
    table: Arc<InMemoryResourceTable>,
    column: ResourceColumn,
}

#[async_trait]
impl AttributeLookup for ColumnLookup {
    async fn lookup(&self, resource_id: &str) -> StorageResult<Option<String>> {
        let rows = self.table.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(resource_id).and_then(|row| match self.column {
            ResourceColumn::Owner => row.owner.clone(),
            ResourceColumn::Department => row.department.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn columns_read_their_own_attribute() {
        let incidents = InMemoryResourceTable::new();
        incidents.insert("INC-1", Some("alice"), Some("IT")).unwrap();
        incidents.insert("INC-2", None, None).unwrap();

        let owner = incidents.column(ResourceColumn::Owner);
        let department = incidents.column(ResourceColumn::Department);

        assert_eq!(owner.lookup("INC-1").await.unwrap().as_deref(), Some("alice"));
        assert_eq!(department.lookup("INC-1").await.unwrap().as_deref(), Some("IT"));
        assert_eq!(owner.lookup("INC-2").await.unwrap(), None);
        assert_eq!(owner.lookup("INC-404").await.unwrap(), None);
    }
}
