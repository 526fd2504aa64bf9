//! Read-only ledger inspection for `plan`, `status` and `verify`.

use crate::error::{ReconcileError, ReconcileResult};
use sg_core::{audit, AuditReport, Catalog, LedgerEntry};
use sg_db::StoreLedger;

/// Ledger snapshot compared against a catalog.
#[derive(Debug, Clone)]
pub struct Inspection {
    /// Whether the ledger table exists yet.
    pub ledger_exists: bool,
    pub entries: Vec<LedgerEntry>,
    pub audit: AuditReport,
}

/// Read the ledger without creating it. A missing ledger reads as empty.
pub async fn read_ledger<S>(store: &S) -> ReconcileResult<Option<Vec<LedgerEntry>>>
where
    S: StoreLedger + ?Sized,
{
    if !store.ledger_exists().await.map_err(ReconcileError::Ledger)? {
        return Ok(None);
    }
    let entries = store
        .ledger_entries()
        .await
        .map_err(ReconcileError::Ledger)?;
    Ok(Some(entries))
}

/// Audit the store's ledger against `catalog`. Never writes.
pub async fn inspect<S>(store: &S, catalog: &Catalog) -> ReconcileResult<Inspection>
where
    S: StoreLedger + ?Sized,
{
    let ledger = read_ledger(store).await?;
    let ledger_exists = ledger.is_some();
    let entries = ledger.unwrap_or_default();
    let audit = audit(catalog, &entries);
    Ok(Inspection {
        ledger_exists,
        entries,
        audit,
    })
}
