//! sg-engine - Reconciliation engine for schemagate
//!
//! Drives a [`sg_db::Store`] through the reconciliation state machine:
//! connect (with classified, backing-off retries), take the reconciliation
//! lock, plan against the ledger, apply pending migrations in order, release
//! the lock and signal readiness.

pub mod error;
pub mod executor;
pub mod inspect;
pub mod orchestrator;
pub mod readiness;
pub mod report;
pub mod retry;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use error::{ReconcileError, ReconcileResult};
pub use orchestrator::Reconciler;
pub use readiness::{readiness_channel, NotReady, Readiness, ReadinessHandle, ReadinessSignal};
pub use report::{AppliedMigration, AttemptOutcome, ConnectionAttempt, ReconcileReport};
pub use state::ReconcileState;
