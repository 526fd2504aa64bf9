//! sg-core - Core library for schemagate
//!
//! This crate holds the pure parts of startup schema reconciliation: the
//! migration catalog and version types, content checksums, the transient
//! error allow-list, the backoff policy, the migration planner, and the
//! `schemagate.yml` configuration.

pub mod backoff;
pub mod checksum;
pub mod classify;
pub mod config;
pub mod error;
pub mod ledger;
pub mod migration;
pub mod plan;
pub mod version;

pub use backoff::{BackoffPolicy, BackoffStrategy};
pub use checksum::compute_checksum;
pub use classify::{classify, FailureClass, StoreFailure};
pub use config::{Config, DbType};
pub use error::{CoreError, CoreResult};
pub use ledger::LedgerEntry;
pub use migration::{Catalog, Migration};
pub use plan::{audit, plan, AuditReport, AuditStatus, Plan, PlanError};
pub use version::MigrationVersion;
