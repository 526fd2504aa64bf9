//! `sg verify`: exit non-zero if the ledger disagrees with the catalog.

use crate::cli::{GlobalArgs, VerifyArgs};
use crate::commands::common::{self, ExitCode};
use crate::commands::status::print_table;
use anyhow::Result;
use sg_core::AuditStatus;
use sg_engine::inspect::inspect;

/// Execute the verify command
pub async fn execute(_args: &VerifyArgs, global: &GlobalArgs) -> Result<()> {
    let config = common::load_config(global)?;
    let store = common::open_store(&config)?;
    let catalog = common::baked_catalog()?;
    let shutdown = common::shutdown_on_ctrl_c();

    common::connect(&*store, &config, &shutdown).await?;
    let inspection = inspect(&*store, &catalog).await?;
    let audit = &inspection.audit;

    let unchecked = audit
        .rows
        .iter()
        .filter(|r| r.status == AuditStatus::AppliedWithoutChecksum)
        .count();
    if unchecked > 0 {
        log::warn!("{unchecked} applied migration(s) have no recorded checksum and cannot be verified");
    }

    if audit.is_consistent() {
        println!(
            "{}: ledger matches catalog ({} pending)",
            store.target(),
            audit.pending_count()
        );
        return Ok(());
    }

    print_table(&store.target(), &inspection);
    let mismatches = audit.mismatches().count();
    eprintln!(
        "Verification failed: {} drifted ledger entr{}, {mismatches} checksum mismatch(es)",
        audit.drifted.len(),
        if audit.drifted.len() == 1 { "y" } else { "ies" }
    );
    Err(ExitCode(1).into())
}
