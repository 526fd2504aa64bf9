//! Error types for sg-engine

use crate::state::ReconcileState;
use sg_core::{FailureClass, MigrationVersion, PlanError, StoreFailure};
use sg_db::DbError;
use std::time::Duration;
use thiserror::Error;

/// Terminal reconciliation errors.
///
/// Every variant aborts startup; only transient connection failures are
/// retried, and those never escape the connection loop on their own.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// R001: Non-transient connection failure
    #[error("[R001] Fatal connection failure on attempt {attempt}: {failure}")]
    FatalConnection { attempt: u32, failure: StoreFailure },

    /// R002: Transient failures outlasted the retry budget
    #[error(
        "[R002] Database unreachable after {attempts} attempts ({}ms of backoff); last error: {last}",
        .waited.as_millis()
    )]
    ConnectionExhausted {
        attempts: u32,
        waited: Duration,
        last: StoreFailure,
    },

    /// R003: Reconciliation lock not acquired in time
    #[error(
        "[R003] Reconciliation lock not acquired within {}ms; another instance may be stuck",
        .waited.as_millis()
    )]
    LockAcquisitionTimeout { waited: Duration },

    /// R004: Ledger records versions unknown to the catalog
    #[error("[R004] Ledger drift: applied versions not in catalog: {}", format_versions(.versions))]
    LedgerDrift { versions: Vec<MigrationVersion> },

    /// R005: Applied migration content changed
    #[error("[R005] Checksum mismatch for {version} ({name}): ledger has {recorded}, catalog has {expected}")]
    ChecksumMismatch {
        version: MigrationVersion,
        name: String,
        recorded: String,
        expected: String,
    },

    /// R006: Migration failed and was rolled back
    #[error("[R006] Migration {version} ({name}) failed: {source}")]
    MigrationApply {
        version: MigrationVersion,
        name: String,
        #[source]
        source: DbError,
    },

    /// R007: Ledger already had the version being recorded
    #[error("[R007] Ledger already records {version}; another instance applied it without holding the lock")]
    DuplicateEntry { version: MigrationVersion },

    /// R008: Ledger could not be created or read
    #[error("[R008] Ledger unavailable: {0}")]
    Ledger(#[source] DbError),

    /// R009: Lock backend failed for a reason other than timeout
    #[error("[R009] Reconciliation lock failed: {0}")]
    Lock(#[source] DbError),

    /// R010: Shutdown requested before reconciliation finished
    #[error("[R010] Reconciliation cancelled while {state}")]
    Cancelled { state: ReconcileState },
}

/// Result type alias for ReconcileError
pub type ReconcileResult<T> = Result<T, ReconcileError>;

fn format_versions(versions: &[MigrationVersion]) -> String {
    versions
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ReconcileError {
    /// Short machine-readable kind, used in logs and exit diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::FatalConnection { .. } => "fatal_connection",
            ReconcileError::ConnectionExhausted { .. } => "connection_exhausted",
            ReconcileError::LockAcquisitionTimeout { .. } => "lock_timeout",
            ReconcileError::LedgerDrift { .. } => "ledger_drift",
            ReconcileError::ChecksumMismatch { .. } => "checksum_mismatch",
            ReconcileError::MigrationApply { .. } => "migration_apply",
            ReconcileError::DuplicateEntry { .. } => "duplicate_entry",
            ReconcileError::Ledger(_) => "ledger",
            ReconcileError::Lock(_) => "lock",
            ReconcileError::Cancelled { .. } => "cancelled",
        }
    }

    /// Migration version the error refers to, if any.
    pub fn version(&self) -> Option<MigrationVersion> {
        match self {
            ReconcileError::ChecksumMismatch { version, .. }
            | ReconcileError::MigrationApply { version, .. }
            | ReconcileError::DuplicateEntry { version } => Some(*version),
            ReconcileError::LedgerDrift { versions } => versions.first().copied(),
            _ => None,
        }
    }

    /// Classification of the underlying connection failure, for the two
    /// connection variants.
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            ReconcileError::FatalConnection { .. } => Some(FailureClass::Fatal),
            ReconcileError::ConnectionExhausted { .. } => Some(FailureClass::Transient),
            _ => None,
        }
    }
}

impl From<PlanError> for ReconcileError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::LedgerDrift { versions } => ReconcileError::LedgerDrift { versions },
            PlanError::ChecksumMismatch {
                version,
                name,
                recorded,
                expected,
            } => ReconcileError::ChecksumMismatch {
                version,
                name,
                recorded,
                expected,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drift_message_lists_versions() {
        let err = ReconcileError::from(PlanError::LedgerDrift {
            versions: vec![MigrationVersion::new(7), MigrationVersion::new(9)],
        });
        assert_eq!(
            err.to_string(),
            "[R004] Ledger drift: applied versions not in catalog: v007, v009"
        );
        assert_eq!(err.kind(), "ledger_drift");
        assert_eq!(err.version(), Some(MigrationVersion::new(7)));
    }

    #[test]
    fn test_exhausted_is_transient_class() {
        let err = ReconcileError::ConnectionExhausted {
            attempts: 5,
            waited: Duration::from_secs(45),
            last: StoreFailure::with_code("57P03", "the database system is starting up"),
        };
        assert_eq!(err.failure_class(), Some(FailureClass::Transient));
        assert!(err.to_string().contains("45000ms"));
        assert!(err.to_string().contains("57P03"));
    }

    #[test]
    fn test_apply_error_names_migration() {
        let err = ReconcileError::MigrationApply {
            version: MigrationVersion::new(3),
            name: "create_roles".to_string(),
            source: DbError::ExecutionError(StoreFailure::message("syntax error")),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("[R006] Migration v003 (create_roles) failed"));
        assert_eq!(err.version(), Some(MigrationVersion::new(3)));
    }
}
