//! Store trait definitions
//!
//! The reconciliation engine talks to a database only through these traits.
//! Each concern gets its own trait so tests can script one of them without
//! faking the rest; [`Store`] ties them together.

use crate::error::DbResult;
use crate::lock::LockGuard;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sg_core::{LedgerEntry, Migration, MigrationVersion};
use std::collections::BTreeSet;
use std::time::Duration;

/// Connectivity check.
#[async_trait]
pub trait StoreProbe: Send + Sync {
    /// Attempt one connection and a trivial round trip.
    ///
    /// Errors carry a [`sg_core::StoreFailure`] via
    /// [`crate::DbError::failure`] so callers can classify them.
    async fn probe(&self) -> DbResult<()>;
}

/// Migration ledger access.
#[async_trait]
pub trait StoreLedger: Send + Sync {
    /// Create the ledger table if it does not exist. Idempotent.
    async fn ensure_ledger(&self) -> DbResult<()>;

    /// Whether the ledger table exists. Read-only commands use this to avoid
    /// creating it.
    async fn ledger_exists(&self) -> DbResult<bool>;

    /// All ledger entries, ordered by version.
    async fn ledger_entries(&self) -> DbResult<Vec<LedgerEntry>>;

    /// Versions recorded in the ledger.
    async fn applied_versions(&self) -> DbResult<BTreeSet<MigrationVersion>> {
        Ok(self
            .ledger_entries()
            .await?
            .into_iter()
            .map(|e| e.version)
            .collect())
    }

    /// Append an entry. Fails with [`crate::DbError::DuplicateEntry`] if the
    /// version is already recorded.
    async fn record_applied(&self, entry: &LedgerEntry) -> DbResult<()>;
}

/// Cross-instance mutual exclusion.
#[async_trait]
pub trait StoreLock: Send + Sync {
    /// Acquire the reconciliation lock, waiting at most `timeout`.
    async fn acquire_lock(&self, timeout: Duration) -> DbResult<LockGuard>;
}

/// Migration execution.
#[async_trait]
pub trait StoreApply: Send + Sync {
    /// Execute `migration` and record its ledger entry.
    ///
    /// Transactional migrations run in one transaction together with the
    /// ledger insert; on any error nothing is committed. Non-transactional
    /// migrations execute first and are recorded afterwards.
    async fn apply_migration(
        &self,
        migration: &Migration,
        applied_at: DateTime<Utc>,
    ) -> DbResult<LedgerEntry>;
}

/// A complete store as seen by the reconciliation engine.
pub trait Store: StoreProbe + StoreLedger + StoreLock + StoreApply {
    /// Backend identifier for logging (`duckdb`, `postgres`).
    fn backend(&self) -> &'static str;

    /// Connection target for logging, with credentials masked.
    fn target(&self) -> String;
}
