//! `sg up`: reconcile the schema, then optionally hand over to the application.

use crate::cli::{GlobalArgs, UpArgs};
use crate::commands::common::{self, ExitCode};
use anyhow::{Context, Result};
use sg_engine::{ReconcileReport, Reconciler};
use tokio::process::Command;

/// Execute the up command
pub async fn execute(args: &UpArgs, global: &GlobalArgs) -> Result<()> {
    let config = common::load_config(global)?;
    let store = common::open_store(&config)?;
    let catalog = common::baked_catalog()?;
    let shutdown = common::shutdown_on_ctrl_c();

    let reconciler = Reconciler::from_config(store, catalog, &config.reconcile);
    let readiness = reconciler.readiness();

    match reconciler.run(&shutdown).await {
        Ok(report) => print_summary(&config.name, &report),
        Err(err) => {
            eprintln!("Schema reconciliation failed: {err}");
            if let Some(class) = err.failure_class() {
                eprintln!("  failure class: {class}");
            }
            return Err(ExitCode(1).into());
        }
    }

    if args.command.is_empty() {
        return Ok(());
    }

    // Never start the application unless the schema is ready.
    readiness
        .wait_ready()
        .await
        .context("Refusing to start the application")?;

    // The store's connection must be closed before the application opens the
    // same database; an open DuckDB file stays locked by this process.
    drop(reconciler);
    run_application(&args.command).await
}

fn print_summary(name: &str, report: &ReconcileReport) {
    let retries = report.attempts.len().saturating_sub(1);
    if report.applied.is_empty() {
        println!(
            "{name}: schema up to date ({} migration(s), {retries} retr{})",
            report.skipped,
            if retries == 1 { "y" } else { "ies" }
        );
    } else {
        println!(
            "{name}: applied {} migration(s) in {}ms",
            report.applied.len(),
            report.elapsed.as_millis()
        );
        for applied in &report.applied {
            println!(
                "  {} {} ({}ms)",
                applied.version,
                applied.name,
                applied.duration.as_millis()
            );
        }
    }
    if !report.out_of_order.is_empty() {
        let versions: Vec<String> = report.out_of_order.iter().map(ToString::to_string).collect();
        println!("  applied out of order: {}", versions.join(", "));
    }
}

async fn run_application(command: &[String]) -> Result<()> {
    let Some((program, rest)) = command.split_first() else {
        return Ok(());
    };
    log::info!("Starting application: {}", command.join(" "));

    let status = Command::new(program)
        .args(rest)
        .status()
        .await
        .with_context(|| format!("Failed to start '{program}'"))?;

    if status.success() {
        return Ok(());
    }
    let code = status.code().unwrap_or(1);
    log::warn!("Application exited with {status}");
    Err(ExitCode(code).into())
}
