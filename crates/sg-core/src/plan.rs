//! Migration planner and ledger audit.
//!
//! [`plan`] computes which catalog migrations still need to run given the
//! ledger contents. It refuses to plan when the ledger and catalog disagree:
//! a ledger version missing from the catalog is drift, and a recorded
//! checksum that differs from the catalog's means published migration
//! content was edited after it was applied somewhere.
//!
//! [`audit`] is the read-only counterpart used by `sg status` and
//! `sg verify`: it reports every discrepancy instead of stopping at the first.

use crate::ledger::LedgerEntry;
use crate::migration::{Catalog, Migration};
use crate::version::MigrationVersion;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Reasons the planner refuses to produce a plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// P001: ledger records versions the catalog does not contain
    #[error("[P001] Ledger drift: applied version(s) {} are not in the migration catalog", join_versions(.versions))]
    LedgerDrift { versions: Vec<MigrationVersion> },

    /// P002: an applied migration's content changed after it was applied
    #[error("[P002] Checksum mismatch for {version} '{name}': ledger has {recorded}, catalog has {expected}")]
    ChecksumMismatch {
        version: MigrationVersion,
        name: String,
        recorded: String,
        expected: String,
    },
}

fn join_versions(versions: &[MigrationVersion]) -> String {
    versions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pending work computed by [`plan`].
#[derive(Debug, Clone)]
pub struct Plan<'c> {
    /// Migrations to apply, in catalog order.
    pub pending: Vec<&'c Migration>,
    /// Number of catalog migrations already recorded in the ledger.
    pub applied: usize,
    /// Pending versions lower than the highest applied version.
    pub out_of_order: Vec<MigrationVersion>,
}

impl Plan<'_> {
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Compute pending migrations: `catalog - applied`, preserving catalog order.
pub fn plan<'c>(catalog: &'c Catalog, entries: &[LedgerEntry]) -> Result<Plan<'c>, PlanError> {
    let mut drifted: Vec<MigrationVersion> = entries
        .iter()
        .map(|e| e.version)
        .filter(|v| !catalog.contains(*v))
        .collect();
    if !drifted.is_empty() {
        drifted.sort();
        drifted.dedup();
        return Err(PlanError::LedgerDrift { versions: drifted });
    }

    let recorded: HashMap<MigrationVersion, &LedgerEntry> =
        entries.iter().map(|e| (e.version, e)).collect();

    for migration in catalog {
        let Some(entry) = recorded.get(&migration.version) else {
            continue;
        };
        if let Some(recorded_sum) = &entry.checksum {
            let expected = migration.checksum();
            if *recorded_sum != expected {
                return Err(PlanError::ChecksumMismatch {
                    version: migration.version,
                    name: migration.name.to_string(),
                    recorded: recorded_sum.clone(),
                    expected,
                });
            }
        }
    }

    let highest_applied = recorded.keys().max().copied();
    let pending: Vec<&Migration> = catalog
        .iter()
        .filter(|m| !recorded.contains_key(&m.version))
        .collect();
    let out_of_order: Vec<MigrationVersion> = match highest_applied {
        Some(high) => pending
            .iter()
            .map(|m| m.version)
            .filter(|v| *v < high)
            .collect(),
        None => Vec::new(),
    };
    if !out_of_order.is_empty() {
        log::warn!(
            "Pending migration(s) {} predate the newest applied version; applying in catalog order",
            join_versions(&out_of_order)
        );
    }

    Ok(Plan {
        applied: catalog.len() - pending.len(),
        pending,
        out_of_order,
    })
}

/// Per-migration audit verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditStatus {
    /// Applied and the recorded checksum matches.
    Applied,
    /// Applied but no checksum was recorded.
    AppliedWithoutChecksum,
    /// Applied with a checksum that no longer matches the catalog.
    ChecksumMismatch { recorded: String, expected: String },
    /// Not yet applied.
    Pending,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Applied => "applied",
            AuditStatus::AppliedWithoutChecksum => "applied (no checksum)",
            AuditStatus::ChecksumMismatch { .. } => "CHECKSUM MISMATCH",
            AuditStatus::Pending => "pending",
        }
    }
}

/// One catalog migration and its ledger state.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRow {
    pub version: MigrationVersion,
    pub name: String,
    #[serde(flatten)]
    pub status: AuditStatus,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Full comparison of a catalog against ledger contents.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub rows: Vec<AuditRow>,
    /// Ledger entries whose version is not in the catalog.
    pub drifted: Vec<LedgerEntry>,
}

impl AuditReport {
    /// No drift and no checksum mismatches (pending migrations are allowed).
    pub fn is_consistent(&self) -> bool {
        self.drifted.is_empty() && self.mismatches().next().is_none()
    }

    pub fn pending_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.status == AuditStatus::Pending)
            .count()
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &AuditRow> {
        self.rows
            .iter()
            .filter(|r| matches!(r.status, AuditStatus::ChecksumMismatch { .. }))
    }
}

/// Compare every catalog migration with the ledger without stopping at the first problem.
pub fn audit(catalog: &Catalog, entries: &[LedgerEntry]) -> AuditReport {
    let recorded: HashMap<MigrationVersion, &LedgerEntry> =
        entries.iter().map(|e| (e.version, e)).collect();

    let rows = catalog
        .iter()
        .map(|migration| {
            let entry = recorded.get(&migration.version);
            let status = match entry {
                None => AuditStatus::Pending,
                Some(entry) => match &entry.checksum {
                    None => AuditStatus::AppliedWithoutChecksum,
                    Some(recorded_sum) => {
                        let expected = migration.checksum();
                        if *recorded_sum == expected {
                            AuditStatus::Applied
                        } else {
                            AuditStatus::ChecksumMismatch {
                                recorded: recorded_sum.clone(),
                                expected,
                            }
                        }
                    }
                },
            };
            AuditRow {
                version: migration.version,
                name: migration.name.to_string(),
                status,
                applied_at: entry.map(|e| e.applied_at),
            }
        })
        .collect();

    let mut drifted: Vec<LedgerEntry> = entries
        .iter()
        .filter(|e| !catalog.contains(e.version))
        .cloned()
        .collect();
    drifted.sort_by_key(|e| e.version);

    AuditReport { rows, drifted }
}

#[cfg(test)]
#[path = "plan_test.rs"]
mod tests;
