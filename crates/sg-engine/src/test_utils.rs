//! Shared test utilities for sg-engine
//!
//! [`ScriptedStore`] is an in-memory [`Store`] whose probe results are
//! scripted up front. Instances created with [`ScriptedStore::share`] see the
//! same ledger and lock, standing in for several application instances
//! pointed at one database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sg_core::{Catalog, LedgerEntry, Migration, MigrationVersion, StoreFailure};
use sg_db::{DbError, DbResult, HeldLock, LockGuard, Store, StoreApply, StoreLedger, StoreLock, StoreProbe};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

/// SQLSTATE 57P03 "cannot_connect_now": a transient failure.
pub fn starting_up() -> StoreFailure {
    StoreFailure::with_code("57P03", "the database system is starting up")
}

/// Connection refused at the socket level: a transient failure.
pub fn refused() -> StoreFailure {
    StoreFailure {
        code: None,
        io_kind: Some(std::io::ErrorKind::ConnectionRefused),
        message: "Connection refused (os error 111)".to_string(),
    }
}

/// SQLSTATE 28P01 "invalid_password": a fatal failure.
pub fn bad_password() -> StoreFailure {
    StoreFailure::with_code("28P01", "password authentication failed for user \"app\"")
}

/// `[v1 create_users, v2 add_email_index]`.
pub fn two_step_catalog() -> Catalog {
    catalog(&[(1, "create_users"), (2, "add_email_index")])
}

/// Catalog with one trivial migration per `(version, name)` pair.
pub fn catalog(items: &[(i64, &str)]) -> Catalog {
    let migrations = items
        .iter()
        .map(|(v, name)| {
            Migration::new(
                MigrationVersion::new(*v),
                *name,
                format!("-- {name}\nSELECT {v};"),
            )
        })
        .collect();
    Catalog::new(migrations).unwrap()
}

struct Shared {
    ledger: Mutex<BTreeMap<MigrationVersion, LedgerEntry>>,
    lock: Arc<tokio::sync::Mutex<()>>,
    ledger_created: Mutex<bool>,
}

/// Scripted in-memory store.
pub struct ScriptedStore {
    shared: Arc<Shared>,
    probes: Mutex<VecDeque<StoreFailure>>,
    probe_calls: AtomicU32,
    applied: Mutex<Vec<MigrationVersion>>,
    fail_apply: Mutex<Option<MigrationVersion>>,
    apply_delay: Duration,
}

impl Default for ScriptedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedStore {
    /// Reachable store with an empty ledger.
    pub fn new() -> Self {
        Self::with_shared(Arc::new(Shared {
            ledger: Mutex::new(BTreeMap::new()),
            lock: Arc::new(tokio::sync::Mutex::new(())),
            ledger_created: Mutex::new(false),
        }))
    }

    fn with_shared(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            probes: Mutex::new(VecDeque::new()),
            probe_calls: AtomicU32::new(0),
            applied: Mutex::new(Vec::new()),
            fail_apply: Mutex::new(None),
            apply_delay: Duration::ZERO,
        }
    }

    /// Another instance over the same ledger and lock, with its own script.
    pub fn share(&self) -> Self {
        let mut other = Self::with_shared(Arc::clone(&self.shared));
        other.apply_delay = self.apply_delay;
        other
    }

    /// Fail the next probes with these failures, in order; later probes succeed.
    pub fn with_probe_failures(self, failures: impl IntoIterator<Item = StoreFailure>) -> Self {
        self.probes.lock().unwrap().extend(failures);
        self
    }

    /// Seed ledger entries.
    pub fn with_ledger(self, entries: impl IntoIterator<Item = LedgerEntry>) -> Self {
        {
            let mut ledger = self.shared.ledger.lock().unwrap();
            for entry in entries {
                ledger.insert(entry.version, entry);
            }
        }
        *self.shared.ledger_created.lock().unwrap() = true;
        self
    }

    /// Seed ledger entries for `catalog` versions with matching checksums.
    pub fn with_applied(self, catalog: &Catalog, versions: &[i64]) -> Self {
        let entries: Vec<LedgerEntry> = versions
            .iter()
            .map(|v| {
                let migration = catalog.get(MigrationVersion::new(*v)).unwrap();
                LedgerEntry::new(migration.version, Utc::now(), Some(migration.checksum()))
            })
            .collect();
        self.with_ledger(entries)
    }

    /// Make applying `version` fail with an execution error.
    pub fn failing_at(self, version: i64) -> Self {
        *self.fail_apply.lock().unwrap() = Some(MigrationVersion::new(version));
        self
    }

    /// Sleep this long inside every apply, widening race windows.
    pub fn with_apply_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = delay;
        self
    }

    pub fn probe_calls(&self) -> u32 {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Versions this instance applied, in order.
    pub fn applied_by_me(&self) -> Vec<MigrationVersion> {
        self.applied.lock().unwrap().clone()
    }

    /// All ledger versions, across instances.
    pub fn ledger_versions(&self) -> Vec<MigrationVersion> {
        self.shared.ledger.lock().unwrap().keys().copied().collect()
    }

    pub fn ledger_created(&self) -> bool {
        *self.shared.ledger_created.lock().unwrap()
    }

    /// Whether the reconciliation lock is currently free.
    pub fn lock_is_free(&self) -> bool {
        self.shared.lock.try_lock().is_ok()
    }

    /// Hold the reconciliation lock from outside, e.g. a crashed peer.
    pub async fn hold_lock(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.shared.lock).lock_owned().await
    }

    fn insert(&self, entry: LedgerEntry) -> DbResult<()> {
        let mut ledger = self.shared.ledger.lock().unwrap();
        if ledger.contains_key(&entry.version) {
            return Err(DbError::DuplicateEntry {
                version: entry.version,
            });
        }
        ledger.insert(entry.version, entry);
        Ok(())
    }
}

#[async_trait]
impl StoreProbe for ScriptedStore {
    async fn probe(&self) -> DbResult<()> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.probes.lock().unwrap().pop_front();
        match next {
            Some(failure) => Err(DbError::ConnectionError(failure)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StoreLedger for ScriptedStore {
    async fn ensure_ledger(&self) -> DbResult<()> {
        *self.shared.ledger_created.lock().unwrap() = true;
        Ok(())
    }

    async fn ledger_exists(&self) -> DbResult<bool> {
        Ok(self.ledger_created())
    }

    async fn ledger_entries(&self) -> DbResult<Vec<LedgerEntry>> {
        Ok(self.shared.ledger.lock().unwrap().values().cloned().collect())
    }

    async fn record_applied(&self, entry: &LedgerEntry) -> DbResult<()> {
        self.insert(entry.clone())
    }
}

struct ScriptedLock(OwnedMutexGuard<()>);

#[async_trait]
impl HeldLock for ScriptedLock {
    async fn release(self: Box<Self>) -> DbResult<()> {
        drop(self.0);
        Ok(())
    }
}

#[async_trait]
impl StoreLock for ScriptedStore {
    async fn acquire_lock(&self, timeout: Duration) -> DbResult<LockGuard> {
        let guard = tokio::time::timeout(timeout, Arc::clone(&self.shared.lock).lock_owned())
            .await
            .map_err(|_| DbError::LockTimeout { waited: timeout })?;
        Ok(LockGuard::new("scripted", Box::new(ScriptedLock(guard))))
    }
}

#[async_trait]
impl StoreApply for ScriptedStore {
    async fn apply_migration(
        &self,
        migration: &Migration,
        applied_at: DateTime<Utc>,
    ) -> DbResult<LedgerEntry> {
        if !self.apply_delay.is_zero() {
            tokio::time::sleep(self.apply_delay).await;
        }
        if *self.fail_apply.lock().unwrap() == Some(migration.version) {
            return Err(DbError::ExecutionError(StoreFailure::message(format!(
                "Parser Error: syntax error in {}",
                migration.label()
            ))));
        }
        let entry = LedgerEntry::new(migration.version, applied_at, Some(migration.checksum()));
        self.insert(entry.clone())?;
        self.applied.lock().unwrap().push(migration.version);
        Ok(entry)
    }
}

impl Store for ScriptedStore {
    fn backend(&self) -> &'static str {
        "scripted"
    }

    fn target(&self) -> String {
        "memory".to_string()
    }
}
