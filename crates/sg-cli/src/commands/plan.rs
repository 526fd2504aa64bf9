//! `sg plan`: show which migrations the next `sg up` would apply.

use crate::cli::{GlobalArgs, PlanArgs};
use crate::commands::common;
use anyhow::{Context, Result};
use serde::Serialize;
use sg_core::{plan, MigrationVersion};
use sg_engine::inspect::read_ledger;

#[derive(Debug, Serialize)]
struct PendingMigration<'a> {
    version: MigrationVersion,
    name: &'a str,
    checksum: String,
    transactional: bool,
}

#[derive(Debug, Serialize)]
struct PlanOutput<'a> {
    target: String,
    ledger_exists: bool,
    applied: usize,
    pending: Vec<PendingMigration<'a>>,
    out_of_order: Vec<MigrationVersion>,
}

/// Execute the plan command
pub async fn execute(args: &PlanArgs, global: &GlobalArgs) -> Result<()> {
    let config = common::load_config(global)?;
    let store = common::open_store(&config)?;
    let catalog = common::baked_catalog()?;
    let shutdown = common::shutdown_on_ctrl_c();

    common::connect(&*store, &config, &shutdown).await?;
    let ledger = read_ledger(&*store).await?;
    let ledger_exists = ledger.is_some();
    let entries = ledger.unwrap_or_default();

    let plan = plan(&catalog, &entries).context("Cannot plan against this ledger")?;

    let output = PlanOutput {
        target: store.target(),
        ledger_exists,
        applied: plan.applied,
        pending: plan
            .pending
            .iter()
            .map(|m| PendingMigration {
                version: m.version,
                name: &m.name,
                checksum: m.checksum(),
                transactional: m.transactional,
            })
            .collect(),
        out_of_order: plan.out_of_order.clone(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if output.pending.is_empty() {
        println!(
            "{}: up to date ({} migration(s) applied)",
            output.target, output.applied
        );
        return Ok(());
    }

    println!(
        "{}: {} pending migration(s), {} already applied",
        output.target,
        output.pending.len(),
        output.applied
    );
    for pending in &output.pending {
        let marker = if output.out_of_order.contains(&pending.version) {
            "  (out of order)"
        } else if !pending.transactional {
            "  (non-transactional)"
        } else {
            ""
        };
        println!("  {} {}{marker}", pending.version, pending.name);
    }
    Ok(())
}
