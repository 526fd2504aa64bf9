//! Reconciliation orchestrator.
//!
//! A [`Reconciler`] runs one store through
//! `Connecting → Locking → Planning → Applying → Done`, or into `Failed`
//! from wherever something goes wrong. The lock is released on every exit
//! path once taken, and the outcome is published on the readiness signal.

use crate::error::{ReconcileError, ReconcileResult};
use crate::executor::apply_pending;
use crate::readiness::{readiness_channel, ReadinessHandle, ReadinessSignal};
use crate::report::{AppliedMigration, ReconcileReport};
use crate::retry::connect_with_retry;
use crate::state::ReconcileState;
use sg_core::config::ReconcileConfig;
use sg_core::{plan, BackoffPolicy, Catalog, MigrationVersion};
use sg_db::{DbError, Store};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default bound on waiting for another instance's lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Drives startup schema reconciliation for one store.
pub struct Reconciler {
    store: Arc<dyn Store>,
    catalog: Arc<Catalog>,
    policy: BackoffPolicy,
    lock_timeout: Duration,
    readiness: ReadinessSignal,
    state: Mutex<ReconcileState>,
}

/// Work done while the lock is held.
struct LockedOutcome {
    applied: Vec<AppliedMigration>,
    skipped: usize,
    out_of_order: Vec<MigrationVersion>,
}

impl Reconciler {
    /// Reconciler with the default backoff policy and lock timeout.
    pub fn new(store: Arc<dyn Store>, catalog: Arc<Catalog>) -> Self {
        let (readiness, _) = readiness_channel();
        Self {
            store,
            catalog,
            policy: BackoffPolicy::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            readiness,
            state: Mutex::new(ReconcileState::Connecting),
        }
    }

    /// Reconciler tuned by the `reconcile:` config section.
    pub fn from_config(store: Arc<dyn Store>, catalog: Arc<Catalog>, config: &ReconcileConfig) -> Self {
        Self::new(store, catalog)
            .with_backoff(config.backoff_policy())
            .with_lock_timeout(config.lock_timeout())
    }

    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Handle for collaborators that must wait for the schema to be ready.
    pub fn readiness(&self) -> ReadinessHandle {
        self.readiness.subscribe()
    }

    /// Current state of the most recent run.
    pub fn state(&self) -> ReconcileState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(ReconcileState::Failed)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Run reconciliation to completion.
    ///
    /// Cancelling `shutdown` interrupts connection attempts, backoff waits
    /// and the lock wait; it is not observed while migrations are applied.
    pub async fn run(&self, shutdown: &CancellationToken) -> ReconcileResult<ReconcileReport> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        log::info!(
            "[{run_id}] Reconciling {} database {} against {} catalog migration(s)",
            self.store.backend(),
            self.store.target(),
            self.catalog.len()
        );

        let result = self.drive(&run_id, started, shutdown).await;
        match &result {
            Ok(report) => {
                self.enter(&run_id, ReconcileState::Done);
                self.readiness.ready();
                log::info!(
                    "[{run_id}] Schema ready: {} applied, {} already present, {}ms",
                    report.applied.len(),
                    report.skipped,
                    report.elapsed.as_millis()
                );
            }
            Err(err) => {
                self.enter(&run_id, ReconcileState::Failed);
                self.readiness.fail(err.to_string());
                match err.version() {
                    Some(version) => {
                        log::error!("[{run_id}] Reconciliation failed ({}) at {version}: {err}", err.kind())
                    }
                    None => log::error!("[{run_id}] Reconciliation failed ({}): {err}", err.kind()),
                }
            }
        }
        result
    }

    async fn drive(
        &self,
        run_id: &Uuid,
        started: Instant,
        shutdown: &CancellationToken,
    ) -> ReconcileResult<ReconcileReport> {
        self.enter(run_id, ReconcileState::Connecting);
        let attempts = connect_with_retry(&*self.store, &self.policy, shutdown, run_id).await?;

        self.enter(run_id, ReconcileState::Locking);
        let acquired = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                return Err(ReconcileError::Cancelled {
                    state: ReconcileState::Locking,
                });
            }
            acquired = self.store.acquire_lock(self.lock_timeout) => acquired,
        };
        let guard = acquired.map_err(|err| match err {
            DbError::LockTimeout { waited } => ReconcileError::LockAcquisitionTimeout { waited },
            other => ReconcileError::Lock(other),
        })?;
        log::info!("[{run_id}] Acquired reconciliation lock {}", guard.name());

        let outcome = self.plan_and_apply(run_id).await;

        let lock_name = guard.name().to_string();
        if let Err(err) = guard.release().await {
            log::warn!("[{run_id}] Releasing lock {lock_name} failed: {err}; it is freed when the session closes");
        } else {
            log::info!("[{run_id}] Released reconciliation lock {lock_name}");
        }

        let outcome = outcome?;
        Ok(ReconcileReport {
            run_id: *run_id,
            attempts,
            applied: outcome.applied,
            skipped: outcome.skipped,
            out_of_order: outcome.out_of_order,
            elapsed: started.elapsed(),
        })
    }

    async fn plan_and_apply(&self, run_id: &Uuid) -> ReconcileResult<LockedOutcome> {
        self.enter(run_id, ReconcileState::Planning);
        self.store
            .ensure_ledger()
            .await
            .map_err(ReconcileError::Ledger)?;
        let entries = self
            .store
            .ledger_entries()
            .await
            .map_err(ReconcileError::Ledger)?;
        let plan = plan(&self.catalog, &entries)?;
        log::info!(
            "[{run_id}] Ledger has {} entr{}; {} migration(s) pending",
            entries.len(),
            if entries.len() == 1 { "y" } else { "ies" },
            plan.pending.len()
        );

        self.enter(run_id, ReconcileState::Applying);
        let applied = apply_pending(&*self.store, &plan.pending, run_id).await?;

        Ok(LockedOutcome {
            applied,
            skipped: plan.applied,
            out_of_order: plan.out_of_order,
        })
    }

    fn enter(&self, run_id: &Uuid, next: ReconcileState) {
        if let Ok(mut state) = self.state.lock() {
            if !state.can_transition_to(next) && *state != next {
                log::warn!("[{run_id}] Unexpected transition {} -> {next}", *state);
            }
            log::debug!("[{run_id}] {} -> {next}", *state);
            *state = next;
        }
        if !next.is_terminal() {
            self.readiness.enter(next);
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
