//! sg-db - Store abstraction layer for schemagate
//!
//! This crate provides the store traits the reconciliation engine drives
//! (probe, ledger, lock, apply) and their implementations for DuckDB and,
//! with the `postgres` feature, PostgreSQL.

pub mod connect;
pub mod duckdb;
pub mod error;
pub mod lock;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod traits;

pub use connect::open_store;
pub use self::duckdb::DuckDbStore;
pub use error::{DbError, DbResult};
pub use lock::{HeldLock, LockGuard};
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use traits::{Store, StoreApply, StoreLedger, StoreLock, StoreProbe};
