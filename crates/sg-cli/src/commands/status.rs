//! `sg status`: compare the ledger with the baked catalog.

use crate::cli::{GlobalArgs, StatusArgs};
use crate::commands::common;
use anyhow::Result;
use serde::Serialize;
use sg_core::{AuditReport, AuditStatus};
use sg_engine::inspect::{inspect, Inspection};

#[derive(Debug, Serialize)]
struct StatusOutput<'a> {
    target: String,
    ledger_exists: bool,
    consistent: bool,
    pending: usize,
    #[serde(flatten)]
    audit: &'a AuditReport,
}

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let config = common::load_config(global)?;
    let store = common::open_store(&config)?;
    let catalog = common::baked_catalog()?;
    let shutdown = common::shutdown_on_ctrl_c();

    common::connect(&*store, &config, &shutdown).await?;
    let inspection = inspect(&*store, &catalog).await?;

    if args.json {
        let output = StatusOutput {
            target: store.target(),
            ledger_exists: inspection.ledger_exists,
            consistent: inspection.audit.is_consistent(),
            pending: inspection.audit.pending_count(),
            audit: &inspection.audit,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_table(&store.target(), &inspection);
    Ok(())
}

pub(crate) fn print_table(target: &str, inspection: &Inspection) {
    let audit = &inspection.audit;
    if !inspection.ledger_exists {
        println!("{target}: no ledger yet");
    } else {
        let count = inspection.entries.len();
        println!(
            "{target}: {count} ledger entr{}",
            if count == 1 { "y" } else { "ies" }
        );
    }

    let name_width = audit
        .rows
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(4)
        .max(4);

    println!(
        "  {:<8} {:<name_width$} {:<22} APPLIED AT",
        "VERSION", "NAME", "STATUS"
    );
    for row in &audit.rows {
        let applied_at = row
            .applied_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<8} {:<name_width$} {:<22} {}",
            row.version.to_string(),
            row.name,
            row.status.as_str(),
            applied_at
        );
        if let AuditStatus::ChecksumMismatch { recorded, expected } = &row.status {
            println!("           ledger {recorded}");
            println!("           binary {expected}");
        }
    }
    for entry in &audit.drifted {
        println!(
            "  {:<8} {:<name_width$} {:<22} {}",
            entry.version.to_string(),
            "?",
            "NOT IN CATALOG",
            entry.applied_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}
