//! DuckDB store implementation

use crate::error::{DbError, DbResult};
use crate::lock::{HeldLock, LockGuard};
use crate::traits::{Store, StoreApply, StoreLedger, StoreLock, StoreProbe};
use ::duckdb::{params, Connection, OptionalExt};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sg_core::ledger::is_valid_table_name;
use sg_core::{LedgerEntry, Migration, MigrationVersion, StoreFailure};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

const TIMESTAMP_WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const TIMESTAMP_READ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// DuckDB store.
///
/// The connection is opened lazily by the first [`StoreProbe::probe`].
/// DuckDB is embedded, so its own file lock already keeps other processes
/// out; the reconciliation lock serializes stores created from one another
/// with [`DuckDbStore::try_clone`] inside this process.
pub struct DuckDbStore {
    path: String,
    ledger_table: String,
    conn: Mutex<Option<Connection>>,
    reconcile_lock: Arc<tokio::sync::Mutex<()>>,
}

impl DuckDbStore {
    /// Create an unconnected store for `path` (`:memory:` for an in-memory database).
    pub fn new(path: &str, ledger_table: &str) -> DbResult<Self> {
        if path.trim().is_empty() {
            return Err(DbError::InvalidConfig("DuckDB path is empty".to_string()));
        }
        if !is_valid_table_name(ledger_table) {
            return Err(DbError::InvalidConfig(format!(
                "invalid ledger table name '{ledger_table}'"
            )));
        }
        Ok(Self {
            path: path.to_string(),
            ledger_table: ledger_table.to_string(),
            conn: Mutex::new(None),
            reconcile_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Create an in-memory store with the default ledger table.
    pub fn in_memory() -> DbResult<Self> {
        Self::new(":memory:", sg_core::ledger::DEFAULT_LEDGER_TABLE)
    }

    /// Open a second connection to the same database instance.
    ///
    /// The clone shares the reconciliation lock with `self`, which makes it
    /// behave like another application instance pointed at the same database.
    pub fn try_clone(&self) -> DbResult<Self> {
        let mut guard = self.lock_conn()?;
        let conn = match guard.as_ref() {
            Some(conn) => conn.try_clone()?,
            None => {
                let conn = self.open()?;
                let clone = conn.try_clone()?;
                *guard = Some(conn);
                clone
            }
        };
        Ok(Self {
            path: self.path.clone(),
            ledger_table: self.ledger_table.clone(),
            conn: Mutex::new(Some(conn)),
            reconcile_lock: Arc::clone(&self.reconcile_lock),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn ledger_table(&self) -> &str {
        &self.ledger_table
    }

    /// Execute arbitrary SQL on the open connection.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.with_conn(|conn| Ok(conn.execute_batch(sql)?))
    }

    /// Count rows returned by `sql`.
    pub fn query_count(&self, sql: &str) -> DbResult<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM ({sql})"), [], |row| row.get(0))?;
            row_count(count)
        })
    }

    /// Whether a table or view exists.
    pub fn relation_exists(&self, name: &str) -> DbResult<bool> {
        let (schema, table) = name.rsplit_once('.').unwrap_or(("main", name));
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
                    params![schema, table],
                    |row| row.get::<_, i32>(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    fn open(&self) -> DbResult<Connection> {
        let conn = if self.path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(Path::new(&self.path))?
        };
        Ok(conn)
    }

    fn lock_conn(&self) -> DbResult<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    fn with_conn<F, T>(&self, body: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
    {
        let guard = self.lock_conn()?;
        let conn = guard.as_ref().ok_or(DbError::NotConnected)?;
        body(conn)
    }

    /// Run `body` inside BEGIN/COMMIT, rolling back on error.
    fn transaction<F, T>(&self, body: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
    {
        self.with_conn(|conn| {
            conn.execute_batch("BEGIN TRANSACTION")?;

            let result = body(conn);

            match &result {
                Ok(_) => {
                    if let Err(commit_err) = conn.execute_batch("COMMIT") {
                        let _ = conn.execute_batch("ROLLBACK");
                        return Err(commit_err.into());
                    }
                }
                Err(_) => {
                    let _ = conn.execute_batch("ROLLBACK");
                }
            }
            result
        })
    }

    fn insert_entry(&self, conn: &Connection, entry: &LedgerEntry) -> DbResult<()> {
        let existing: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE version = ?", self.ledger_table),
            params![entry.version.get()],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(DbError::DuplicateEntry {
                version: entry.version,
            });
        }

        let applied_at = entry.applied_at.format(TIMESTAMP_WRITE_FORMAT).to_string();
        conn.execute(
            &format!(
                "INSERT INTO {} (version, applied_at, checksum) VALUES (?, CAST(? AS TIMESTAMP), ?)",
                self.ledger_table
            ),
            params![entry.version.get(), applied_at, entry.checksum],
        )?;
        Ok(())
    }
}

fn row_count(count: i64) -> DbResult<usize> {
    usize::try_from(count).map_err(|_| {
        DbError::ExecutionError(StoreFailure::message(format!(
            "row count {count} out of range"
        )))
    })
}

fn parse_timestamp(raw: &str) -> DbResult<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, TIMESTAMP_READ_FORMAT)
        .map_err(|e| DbError::CorruptLedger(format!("applied_at '{raw}': {e}")))?;
    Ok(Utc.from_utc_datetime(&naive))
}

#[async_trait]
impl StoreProbe for DuckDbStore {
    async fn probe(&self) -> DbResult<()> {
        let mut guard = self.lock_conn()?;
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        let conn = guard.as_ref().ok_or(DbError::NotConnected)?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0))?;
        Ok(())
    }
}

#[async_trait]
impl StoreLedger for DuckDbStore {
    async fn ensure_ledger(&self) -> DbResult<()> {
        let schema_ddl = match self.ledger_table.split_once('.') {
            Some((schema, _)) => format!("CREATE SCHEMA IF NOT EXISTS {schema};"),
            None => String::new(),
        };
        let sql = format!(
            "{schema_ddl}
             CREATE TABLE IF NOT EXISTS {} (
                 version    BIGINT PRIMARY KEY,
                 applied_at TIMESTAMP NOT NULL,
                 checksum   VARCHAR
             );",
            self.ledger_table
        );
        self.execute_batch(&sql)
    }

    async fn ledger_exists(&self) -> DbResult<bool> {
        self.relation_exists(&self.ledger_table)
    }

    async fn ledger_entries(&self) -> DbResult<Vec<LedgerEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT version, CAST(applied_at AS VARCHAR), checksum FROM {} ORDER BY version",
                self.ledger_table
            ))?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (raw_version, raw_applied_at, checksum) = row?;
                let version = MigrationVersion::try_new(raw_version).ok_or_else(|| {
                    DbError::CorruptLedger(format!("non-positive version {raw_version}"))
                })?;
                entries.push(LedgerEntry::new(
                    version,
                    parse_timestamp(&raw_applied_at)?,
                    checksum,
                ));
            }
            Ok(entries)
        })
    }

    async fn record_applied(&self, entry: &LedgerEntry) -> DbResult<()> {
        self.transaction(|conn| self.insert_entry(conn, entry))
    }
}

struct DuckDbHeldLock(OwnedMutexGuard<()>);

#[async_trait]
impl HeldLock for DuckDbHeldLock {
    async fn release(self: Box<Self>) -> DbResult<()> {
        drop(self.0);
        Ok(())
    }
}

#[async_trait]
impl StoreLock for DuckDbStore {
    async fn acquire_lock(&self, timeout: Duration) -> DbResult<LockGuard> {
        let lock = Arc::clone(&self.reconcile_lock);
        let guard = tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| DbError::LockTimeout { waited: timeout })?;
        Ok(LockGuard::new(
            format!("duckdb:{}", self.path),
            Box::new(DuckDbHeldLock(guard)),
        ))
    }
}

#[async_trait]
impl StoreApply for DuckDbStore {
    async fn apply_migration(
        &self,
        migration: &Migration,
        applied_at: DateTime<Utc>,
    ) -> DbResult<LedgerEntry> {
        let entry = LedgerEntry::new(migration.version, applied_at, Some(migration.checksum()));

        if migration.transactional {
            self.transaction(|conn| {
                conn.execute_batch(&migration.sql)?;
                self.insert_entry(conn, &entry)
            })?;
        } else {
            self.with_conn(|conn| Ok(conn.execute_batch(&migration.sql)?))?;
            log::warn!(
                "{} ran outside a transaction; recording ledger entry separately",
                migration.label()
            );
            self.transaction(|conn| self.insert_entry(conn, &entry))?;
        }
        Ok(entry)
    }
}

impl Store for DuckDbStore {
    fn backend(&self) -> &'static str {
        "duckdb"
    }

    fn target(&self) -> String {
        self.path.clone()
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
