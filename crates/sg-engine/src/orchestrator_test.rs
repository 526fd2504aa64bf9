use super::*;
use crate::readiness::{NotReady, Readiness};
use crate::report::AttemptOutcome;
use crate::test_utils::{bad_password, catalog, refused, starting_up, two_step_catalog, ScriptedStore};
use chrono::Utc;
use sg_core::{LedgerEntry, StoreFailure};

const BASE: Duration = Duration::from_secs(3);

fn v(n: i64) -> MigrationVersion {
    MigrationVersion::new(n)
}

fn reconciler(store: &Arc<ScriptedStore>, catalog: Catalog, max_retries: u32) -> Reconciler {
    Reconciler::new(store.clone(), Arc::new(catalog))
        .with_backoff(BackoffPolicy::linear(BASE, max_retries))
        .with_lock_timeout(Duration::from_secs(1))
}

#[tokio::test(start_paused = true)]
async fn test_fresh_database_applies_catalog_in_order() {
    let store = Arc::new(ScriptedStore::new());
    let reconciler = reconciler(&store, two_step_catalog(), 5);

    let report = reconciler.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.applied_versions(), vec![v(1), v(2)]);
    assert_eq!(report.skipped, 0);
    assert_eq!(store.applied_by_me(), vec![v(1), v(2)]);
    assert_eq!(store.ledger_versions(), vec![v(1), v(2)]);
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(reconciler.state(), ReconcileState::Done);
    assert!(store.lock_is_free());
}

#[tokio::test(start_paused = true)]
async fn test_up_to_date_ledger_applies_nothing() {
    let catalog = two_step_catalog();
    let store = Arc::new(ScriptedStore::new().with_applied(&catalog, &[1, 2]));
    let reconciler = reconciler(&store, catalog, 5);

    let report = reconciler.run(&CancellationToken::new()).await.unwrap();

    assert!(report.applied.is_empty());
    assert_eq!(report.skipped, 2);
    assert!(store.applied_by_me().is_empty());
    assert_eq!(reconciler.state(), ReconcileState::Done);
}

#[tokio::test(start_paused = true)]
async fn test_two_transient_failures_then_success() {
    let store = Arc::new(ScriptedStore::new().with_probe_failures([starting_up(), refused()]));
    let reconciler = reconciler(&store, two_step_catalog(), 5);

    let started = Instant::now();
    let report = reconciler.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(store.probe_calls(), 3);
    let waits: Vec<Option<Duration>> = report.attempts.iter().map(|a| a.wait).collect();
    assert_eq!(waits, vec![Some(BASE), Some(BASE * 2), None]);
    assert_eq!(report.attempts[2].outcome, AttemptOutcome::Connected);
    assert_eq!(report.backoff_waited(), BASE * 3);
    assert_eq!(started.elapsed(), BASE * 3);
    assert_eq!(report.applied_versions(), vec![v(1), v(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_wait_full_budget() {
    let max_retries = 5;
    let store = Arc::new(ScriptedStore::new().with_probe_failures(vec![starting_up(); 10]));
    let reconciler = reconciler(&store, two_step_catalog(), max_retries);

    let started = Instant::now();
    let err = reconciler.run(&CancellationToken::new()).await.unwrap_err();

    // base * (1 + 2 + 3 + 4 + 5)
    let budget = BASE * 15;
    match err {
        ReconcileError::ConnectionExhausted {
            attempts,
            waited,
            last,
        } => {
            assert_eq!(attempts, max_retries);
            assert_eq!(waited, budget);
            assert_eq!(last, starting_up());
        }
        other => panic!("expected ConnectionExhausted, got {other:?}"),
    }
    assert_eq!(started.elapsed(), budget);
    assert_eq!(store.probe_calls(), max_retries);
    assert!(!store.ledger_created());
    assert_eq!(reconciler.state(), ReconcileState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_failure_short_circuits_at_any_attempt() {
    for transient_before in 0..4usize {
        let mut script = vec![refused(); transient_before];
        script.push(bad_password());
        let store = Arc::new(ScriptedStore::new().with_probe_failures(script));
        let reconciler = reconciler(&store, two_step_catalog(), 5);

        let err = reconciler.run(&CancellationToken::new()).await.unwrap_err();

        let expected_attempt = transient_before as u32 + 1;
        assert!(
            matches!(err, ReconcileError::FatalConnection { attempt, .. } if attempt == expected_attempt),
            "unexpected error {err:?}"
        );
        assert_eq!(store.probe_calls(), expected_attempt);
        assert!(!store.ledger_created());
    }
}

#[tokio::test(start_paused = true)]
async fn test_unknown_failure_is_fatal() {
    let store = Arc::new(
        ScriptedStore::new().with_probe_failures([StoreFailure::message("something odd happened")]),
    );
    let reconciler = reconciler(&store, two_step_catalog(), 5);

    let err = reconciler.run(&CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind(), "fatal_connection");
    assert_eq!(store.probe_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_running_twice_applies_each_migration_once() {
    let store = Arc::new(ScriptedStore::new());
    let reconciler = reconciler(&store, two_step_catalog(), 5);

    let first = reconciler.run(&CancellationToken::new()).await.unwrap();
    let second = reconciler.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(first.applied.len(), 2);
    assert!(second.applied.is_empty());
    assert_eq!(second.skipped, 2);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(store.applied_by_me(), vec![v(1), v(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_ledger_drift_applies_nothing() {
    let store = Arc::new(
        ScriptedStore::new().with_ledger([LedgerEntry::new(v(7), Utc::now(), None)]),
    );
    let reconciler = reconciler(&store, two_step_catalog(), 5);

    let err = reconciler.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::LedgerDrift { ref versions } if versions == &vec![v(7)]));
    assert!(store.applied_by_me().is_empty());
    assert!(store.lock_is_free());
}

#[tokio::test(start_paused = true)]
async fn test_checksum_mismatch_applies_nothing() {
    let catalog = catalog(&[(1, "create_users"), (2, "add_email_index"), (3, "create_roles")]);
    let store = Arc::new(ScriptedStore::new().with_ledger([LedgerEntry::new(
        v(1),
        Utc::now(),
        Some("0".repeat(64)),
    )]));
    let reconciler = reconciler(&store, catalog, 5);

    let err = reconciler.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::ChecksumMismatch { version, .. } if version == v(1)));
    assert!(store.applied_by_me().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_apply_failure_stops_and_releases_lock() {
    let catalog = catalog(&[(1, "create_users"), (2, "add_email_index"), (3, "create_roles")]);
    let store = Arc::new(ScriptedStore::new().failing_at(2));
    let reconciler = reconciler(&store, catalog, 5);
    let readiness = reconciler.readiness();

    let err = reconciler.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::MigrationApply { version, .. } if version == v(2)));
    assert_eq!(store.ledger_versions(), vec![v(1)]);
    assert!(store.lock_is_free());
    assert!(matches!(readiness.current(), Readiness::Failed(ref msg) if msg.contains("v002")));
}

#[tokio::test(start_paused = true)]
async fn test_lock_timeout_when_peer_never_releases() {
    let store = Arc::new(ScriptedStore::new());
    let _held = store.hold_lock().await;
    let reconciler = reconciler(&store, two_step_catalog(), 5);

    let err = reconciler.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::LockAcquisitionTimeout { waited } if waited == Duration::from_secs(1)
    ));
    assert!(!store.ledger_created());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_skips_locking() {
    let store = Arc::new(ScriptedStore::new().with_probe_failures(vec![starting_up(); 10]));
    let reconciler = Arc::new(reconciler(&store, two_step_catalog(), 5));
    let shutdown = CancellationToken::new();

    let task = {
        let reconciler = reconciler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { reconciler.run(&shutdown).await })
    };
    tokio::time::sleep(BASE + BASE / 2).await;
    shutdown.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Cancelled {
            state: ReconcileState::Connecting
        }
    ));
    assert_eq!(store.probe_calls(), 2);
    assert!(!store.ledger_created());
    assert!(store.lock_is_free());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_waiting_for_lock() {
    let store = Arc::new(ScriptedStore::new());
    let held = store.hold_lock().await;
    let reconciler = Arc::new(
        reconciler(&store, two_step_catalog(), 5).with_lock_timeout(Duration::from_secs(600)),
    );
    let shutdown = CancellationToken::new();

    let task = {
        let reconciler = reconciler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { reconciler.run(&shutdown).await })
    };
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(reconciler.state(), ReconcileState::Locking);
    shutdown.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Cancelled {
            state: ReconcileState::Locking
        }
    ));
    drop(held);
    assert!(store.lock_is_free());
    assert!(!store.ledger_created());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_instances_apply_each_migration_once() {
    let catalog = Arc::new(catalog(&[
        (1, "create_users"),
        (2, "add_email_index"),
        (3, "create_roles"),
    ]));
    let first = Arc::new(ScriptedStore::new().with_apply_delay(Duration::from_millis(200)));
    let second = Arc::new(first.share());

    let a = Reconciler::new(first.clone(), catalog.clone());
    let b = Reconciler::new(second.clone(), catalog.clone());
    let shutdown = CancellationToken::new();

    let (ra, rb) = tokio::join!(a.run(&shutdown), b.run(&shutdown));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(first.ledger_versions(), vec![v(1), v(2), v(3)]);
    assert_eq!(ra.applied.len() + rb.applied.len(), 3);
    assert!(ra.applied.is_empty() || rb.applied.is_empty());
    let mut all = first.applied_by_me();
    all.extend(second.applied_by_me());
    all.sort();
    assert_eq!(all, vec![v(1), v(2), v(3)]);
}

#[tokio::test(start_paused = true)]
async fn test_readiness_follows_run() {
    let store = Arc::new(ScriptedStore::new().with_probe_failures([refused()]));
    let reconciler = Arc::new(reconciler(&store, two_step_catalog(), 5));
    let readiness = reconciler.readiness();

    let waiter = {
        let readiness = readiness.clone();
        tokio::spawn(async move { readiness.wait_ready().await })
    };
    let task = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.run(&CancellationToken::new()).await })
    };

    tokio::time::sleep(BASE / 2).await;
    assert_eq!(readiness.state(), ReconcileState::Connecting);

    task.await.unwrap().unwrap();
    assert_eq!(waiter.await.unwrap(), Ok(()));
    assert!(readiness.is_ready());
}

#[tokio::test(start_paused = true)]
async fn test_readiness_reports_failure_diagnostic() {
    let store = Arc::new(ScriptedStore::new().with_probe_failures([bad_password()]));
    let reconciler = reconciler(&store, two_step_catalog(), 5);
    let readiness = reconciler.readiness();

    reconciler.run(&CancellationToken::new()).await.unwrap_err();

    match readiness.wait_ready().await {
        Err(NotReady::Failed(msg)) => assert!(msg.starts_with("[R001]"), "{msg}"),
        other => panic!("unexpected readiness {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_from_config_uses_reconcile_section() {
    let mut config = ReconcileConfig::default();
    config.max_retries = 2;
    config.base_backoff_ms = 100;
    let store = Arc::new(ScriptedStore::new().with_probe_failures(vec![refused(); 5]));
    let reconciler = Reconciler::from_config(store.clone(), Arc::new(two_step_catalog()), &config);

    let started = Instant::now();
    let err = reconciler.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::ConnectionExhausted { attempts: 2, .. }));
    assert_eq!(started.elapsed(), Duration::from_millis(300));
}
