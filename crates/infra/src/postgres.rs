//! Shared PostgreSQL plumbing: pool creation, bootstrap schema, error mapping.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StorageError |
//! |------------|----------------------|--------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (other) | any other | `Backend` |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Unavailable` |
//! | Other | N/A | `Backend` |

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, instrument};

use itsm_core::{StorageError, TenantId};

use crate::config::EngineConfig;

/// Tables owned by the engine itself. The ITSM resource tables (incidents,
/// problems, changes, assets) belong to the CRUD services and are only read.
const BOOTSTRAP_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tenants (
        tenant_id       TEXT PRIMARY KEY,
        name            TEXT NOT NULL,
        description     TEXT NOT NULL DEFAULT '',
        admin_username  TEXT,
        domain          TEXT,
        settings        JSONB NOT NULL DEFAULT '{}'::jsonb,
        status          TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
        created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at      TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS tenants_active_domain_key
        ON tenants (domain)
        WHERE status = 'active' AND domain IS NOT NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS global_roles (
        username    TEXT PRIMARY KEY,
        role        TEXT NOT NULL,
        assigned_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_roles (
        username    TEXT NOT NULL,
        tenant_id   TEXT NOT NULL,
        role        TEXT NOT NULL,
        assigned_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (username, tenant_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_partitions (
        tenant_id       TEXT PRIMARY KEY,
        schema_version  INTEGER NOT NULL,
        provisioned_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

/// Open a connection pool using the configured URL and pool size.
pub async fn connect(database_url: &str, config: &EngineConfig) -> Result<PgPool, StorageError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Create the engine-owned tables if they do not exist yet.
#[instrument(skip(pool), err)]
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StorageError> {
    let mut tx = pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;
    for statement in BOOTSTRAP_STATEMENTS {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    }
    tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
    info!(statements = BOOTSTRAP_STATEMENTS.len(), "engine schema ready");
    Ok(())
}

/// Postgres schema holding one tenant's partition.
///
/// Tenant ids are validated slugs, so quoting is enough to make them safe
/// identifiers.
pub(crate) fn partition_schema_name(tenant_id: &TenantId) -> String {
    format!("\"tenant_{}\"", tenant_id.as_str())
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StorageError::UniqueViolation(
                    db_err.constraint().map(str::to_string).unwrap_or(msg),
                ),
                _ => StorageError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StorageError::Unavailable(format!("connection pool unavailable in {}", operation))
        }
        sqlx::Error::Io(io) => StorageError::Unavailable(format!("io error in {}: {}", operation, io)),
        other => StorageError::Backend(format!("sqlx error in {}: {}", operation, other)),
    }
}
