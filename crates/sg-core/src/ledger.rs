//! Ledger entry recorded for every applied migration.

use crate::version::MigrationVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default name of the ledger table inside the target database.
pub const DEFAULT_LEDGER_TABLE: &str = "__schemagate_ledger";

/// One row of the migration ledger.
///
/// An entry exists for a version iff that migration was applied and committed.
/// Entries are append-only: schemagate never updates or deletes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub version: MigrationVersion,
    pub applied_at: DateTime<Utc>,
    /// Checksum of the migration SQL at apply time. `None` for entries written
    /// by tooling that did not record checksums.
    #[serde(default)]
    pub checksum: Option<String>,
}

impl LedgerEntry {
    pub fn new(version: MigrationVersion, applied_at: DateTime<Utc>, checksum: Option<String>) -> Self {
        Self {
            version,
            applied_at,
            checksum,
        }
    }
}

/// Check that `name` is a plain SQL identifier (optionally schema-qualified).
///
/// The ledger table name is interpolated into DDL, so only ASCII letters,
/// digits and underscores are accepted, with at most one `.` separator.
pub fn is_valid_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return false;
    }
    parts.iter().all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_table_names() {
        assert!(is_valid_table_name(DEFAULT_LEDGER_TABLE));
        assert!(is_valid_table_name("ops.schema_ledger"));
        assert!(is_valid_table_name("ledger2"));
    }

    #[test]
    fn test_invalid_table_names() {
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("2ledger"));
        assert!(!is_valid_table_name("a.b.c"));
        assert!(!is_valid_table_name("ledger; DROP TABLE users"));
        assert!(!is_valid_table_name("ops."));
    }
}
