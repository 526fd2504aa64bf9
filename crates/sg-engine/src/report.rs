//! Outcome records for a reconciliation run.

use chrono::{DateTime, Utc};
use sg_core::{MigrationVersion, StoreFailure};
use std::time::Duration;
use uuid::Uuid;

/// Classified result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Connected,
    Transient(StoreFailure),
    Fatal(StoreFailure),
}

/// One pass of the connection loop. Lives only as long as the run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    /// Backoff waited after this attempt, if any.
    pub wait: Option<Duration>,
}

/// A migration applied during this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: MigrationVersion,
    pub name: String,
    pub checksum: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub run_id: Uuid,
    pub attempts: Vec<ConnectionAttempt>,
    pub applied: Vec<AppliedMigration>,
    /// Catalog migrations already present in the ledger.
    pub skipped: usize,
    /// Pending versions that were older than the newest applied one.
    pub out_of_order: Vec<MigrationVersion>,
    pub elapsed: Duration,
}

impl ReconcileReport {
    /// Total backoff waited while connecting.
    pub fn backoff_waited(&self) -> Duration {
        self.attempts.iter().filter_map(|a| a.wait).sum()
    }

    pub fn applied_versions(&self) -> Vec<MigrationVersion> {
        self.applied.iter().map(|m| m.version).collect()
    }
}
