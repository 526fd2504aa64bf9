//! Error types for sg-db

use sg_core::{MigrationVersion, StoreFailure};
use std::time::Duration;
use thiserror::Error;

/// Store operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(StoreFailure),

    /// Statement execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(StoreFailure),

    /// Ledger already records this version (D003)
    #[error("[D003] Ledger already contains an entry for {version}")]
    DuplicateEntry { version: MigrationVersion },

    /// Reconciliation lock wait exceeded (D004)
    #[error("[D004] Reconciliation lock not acquired within {}ms", .waited.as_millis())]
    LockTimeout { waited: Duration },

    /// Backend not compiled in (D005)
    #[error("[D005] Feature not implemented for {backend}: {feature}")]
    NotImplemented { backend: String, feature: String },

    /// Mutex poisoned (D006)
    #[error("[D006] Database mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Invalid store configuration (D007)
    #[error("[D007] Invalid store configuration: {0}")]
    InvalidConfig(String),

    /// Operation requires an open connection (D008)
    #[error("[D008] Store is not connected; probe it first")]
    NotConnected,

    /// Ledger row could not be decoded (D009)
    #[error("[D009] Unreadable ledger row: {0}")]
    CorruptLedger(String),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Failure signature used by the transient/fatal classifier.
    pub fn failure(&self) -> StoreFailure {
        match self {
            DbError::ConnectionError(failure) | DbError::ExecutionError(failure) => failure.clone(),
            other => StoreFailure::message(other.to_string()),
        }
    }
}

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error does not expose structured error codes, so the
        // message is inspected. Only failures to reach the database file are
        // connection errors; everything else is an execution error.
        let msg = err.to_string();
        if msg.contains("Could not set lock on file")
            || msg.contains("Cannot open file")
            || msg.contains("database has been invalidated")
        {
            DbError::ConnectionError(StoreFailure::message(msg))
        } else {
            DbError::ExecutionError(StoreFailure::message(msg))
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned());
                let failure = StoreFailure {
                    code: code.clone(),
                    io_kind: None,
                    message: db_err.message().to_string(),
                };
                let connection_class = code.as_deref().is_some_and(|c| {
                    c.starts_with("08") || c.starts_with("57P") || c == "53300" || c.starts_with("28")
                });
                if connection_class {
                    DbError::ConnectionError(failure)
                } else {
                    DbError::ExecutionError(failure)
                }
            }
            sqlx::Error::Io(io_err) => DbError::ConnectionError(StoreFailure::from_io(&io_err)),
            sqlx::Error::PoolTimedOut => DbError::ConnectionError(StoreFailure {
                code: None,
                io_kind: Some(std::io::ErrorKind::TimedOut),
                message: "timed out acquiring a pooled connection".to_string(),
            }),
            sqlx::Error::Tls(tls_err) => {
                DbError::ConnectionError(StoreFailure::message(format!("TLS error: {tls_err}")))
            }
            sqlx::Error::Configuration(cfg_err) => DbError::InvalidConfig(cfg_err.to_string()),
            other => DbError::ExecutionError(StoreFailure::message(other.to_string())),
        }
    }
}
