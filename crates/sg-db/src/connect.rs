//! Store construction from configuration.

use crate::duckdb::DuckDbStore;
use crate::error::{DbError, DbResult};
use crate::traits::Store;
use sg_core::config::{DatabaseConfig, ReconcileConfig};
use sg_core::DbType;
use std::sync::Arc;

/// Build the store described by `database`. No connection is opened yet.
pub fn open_store(database: &DatabaseConfig, reconcile: &ReconcileConfig) -> DbResult<Arc<dyn Store>> {
    match database.db_type {
        DbType::DuckDb => Ok(Arc::new(DuckDbStore::new(
            &database.path,
            &reconcile.ledger_table,
        )?)),
        DbType::Postgres => open_postgres(database, reconcile),
    }
}

#[cfg(feature = "postgres")]
fn open_postgres(database: &DatabaseConfig, reconcile: &ReconcileConfig) -> DbResult<Arc<dyn Store>> {
    let url = database
        .url
        .as_deref()
        .ok_or_else(|| DbError::InvalidConfig("database.url is required for postgres".to_string()))?;
    Ok(Arc::new(crate::postgres::PostgresStore::new(
        url,
        &reconcile.ledger_table,
        reconcile.connect_timeout(),
    )?))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(_database: &DatabaseConfig, _reconcile: &ReconcileConfig) -> DbResult<Arc<dyn Store>> {
    Err(DbError::NotImplemented {
        backend: "postgres".to_string(),
        feature: "built without the `postgres` feature".to_string(),
    })
}
