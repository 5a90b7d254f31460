//! Postgres attribute lookups over the ITSM resource tables.
//!
//! Each lookup reads a single column of a single table, e.g.
//! `SELECT created_by FROM incidents WHERE ticket_id = $1`.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use itsm_core::{AttributeLookup, DomainError, StorageResult};

use crate::postgres::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresAttributeLookup {
    pool: Arc<PgPool>,
    table: String,
    sql: String,
}

fn check_identifier(kind: &str, value: &str) -> Result<(), DomainError> {
    let valid = !value.is_empty()
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !value.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(DomainError::validation(format!("invalid {kind} identifier '{value}'")))
    }
}

impl PostgresAttributeLookup {
    /// Build a lookup of `value_column` in `table`, keyed by `key_column`.
    ///
    /// Identifiers are interpolated into SQL, so only plain
    /// `[A-Za-z_][A-Za-z0-9_]*` names are accepted.
    pub fn new(
        pool: PgPool,
        table: &str,
        key_column: &str,
        value_column: &str,
    ) -> Result<Self, DomainError> {
        check_identifier("table", table)?;
        check_identifier("column", key_column)?;
        check_identifier("column", value_column)?;

        Ok(Self {
            pool: Arc::new(pool),
            table: table.to_string(),
            sql: format!(
                "SELECT {value_column}::TEXT AS value FROM {table} WHERE {key_column} = $1 LIMIT 1"
            ),
        })
    }
}

#[async_trait]
impl AttributeLookup for PostgresAttributeLookup {
    #[instrument(skip(self), fields(table = %self.table), err)]
    async fn lookup(&self, resource_id: &str) -> StorageResult<Option<String>> {
        let row = sqlx::query(&self.sql)
            .bind(resource_id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("attribute_lookup", e))?;

        match row {
            Some(row) => row
                .try_get::<Option<String>, _>("value")
                .map_err(|e| map_sqlx_error("attribute_lookup", e)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_restricted() {
        assert!(check_identifier("table", "incidents").is_ok());
        assert!(check_identifier("column", "created_by").is_ok());
        for bad in ["", "1table", "incidents;drop", "a-b", "\"x\""] {
            assert!(check_identifier("table", bad).is_err(), "{bad:?}");
        }
    }
}
