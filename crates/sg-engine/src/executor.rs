//! Ordered application of pending migrations.

use crate::error::{ReconcileError, ReconcileResult};
use crate::report::AppliedMigration;
use chrono::Utc;
use sg_core::Migration;
use sg_db::{DbError, StoreApply};
use tokio::time::Instant;
use uuid::Uuid;

/// Apply `pending` in order, stopping at the first failure.
///
/// A failed migration has already been rolled back by the store (or, for a
/// non-transactional migration, left without a ledger entry); nothing after
/// it is attempted.
pub async fn apply_pending<S>(
    store: &S,
    pending: &[&Migration],
    run_id: &Uuid,
) -> ReconcileResult<Vec<AppliedMigration>>
where
    S: StoreApply + ?Sized,
{
    let mut applied = Vec::with_capacity(pending.len());

    for (idx, migration) in pending.iter().enumerate() {
        log::info!(
            "[{run_id}] Applying {} ({}/{})",
            migration.label(),
            idx + 1,
            pending.len()
        );
        let started = Instant::now();

        let entry = match store.apply_migration(migration, Utc::now()).await {
            Ok(entry) => entry,
            Err(DbError::DuplicateEntry { version }) => {
                log::error!(
                    "[{run_id}] Ledger already records {version}; lock discipline violated"
                );
                return Err(ReconcileError::DuplicateEntry { version });
            }
            Err(source) => {
                log::error!(
                    "[{run_id}] {} failed and was rolled back: {source}",
                    migration.label()
                );
                return Err(ReconcileError::MigrationApply {
                    version: migration.version,
                    name: migration.name.to_string(),
                    source,
                });
            }
        };

        let duration = started.elapsed();
        log::info!(
            "[{run_id}] Applied {} in {}ms",
            migration.label(),
            duration.as_millis()
        );
        applied.push(AppliedMigration {
            version: entry.version,
            name: migration.name.to_string(),
            checksum: entry.checksum,
            applied_at: entry.applied_at,
            duration,
        });
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{catalog, ScriptedStore};
    use sg_core::MigrationVersion;

    fn v(n: i64) -> MigrationVersion {
        MigrationVersion::new(n)
    }

    #[tokio::test]
    async fn test_applies_in_order() {
        let catalog = catalog(&[(1, "a"), (2, "b"), (3, "c")]);
        let store = ScriptedStore::new();
        let pending: Vec<&Migration> = catalog.iter().collect();

        let applied = apply_pending(&store, &pending, &Uuid::new_v4()).await.unwrap();
        assert_eq!(
            applied.iter().map(|m| m.version).collect::<Vec<_>>(),
            vec![v(1), v(2), v(3)]
        );
        assert_eq!(store.applied_by_me(), vec![v(1), v(2), v(3)]);
        assert_eq!(applied[0].checksum, Some(catalog.migrations()[0].checksum()));
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let catalog = catalog(&[(1, "a"), (2, "b"), (3, "c")]);
        let store = ScriptedStore::new().failing_at(2);
        let pending: Vec<&Migration> = catalog.iter().collect();

        let err = apply_pending(&store, &pending, &Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::MigrationApply { version, .. } if version == v(2)));
        assert_eq!(store.applied_by_me(), vec![v(1)]);
        assert_eq!(store.ledger_versions(), vec![v(1)]);
    }

    #[tokio::test]
    async fn test_duplicate_entry_surfaces() {
        let catalog = catalog(&[(1, "a")]);
        let store = ScriptedStore::new().with_applied(&catalog, &[1]);
        let pending: Vec<&Migration> = catalog.iter().collect();

        let err = apply_pending(&store, &pending, &Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::DuplicateEntry { version } if version == v(1)));
    }

    #[tokio::test]
    async fn test_empty_pending_is_noop() {
        let store = ScriptedStore::new();
        let applied = apply_pending(&store, &[], &Uuid::new_v4()).await.unwrap();
        assert!(applied.is_empty());
        assert!(store.applied_by_me().is_empty());
    }
}
