//! `sg catalog`: list the migrations baked into this binary.

use crate::cli::{CatalogArgs, GlobalArgs};
use crate::commands::common;
use anyhow::{Context, Result};
use serde::Serialize;
use sg_core::MigrationVersion;

#[derive(Debug, Serialize)]
struct CatalogEntry<'a> {
    version: MigrationVersion,
    name: &'a str,
    checksum: String,
    transactional: bool,
}

/// Execute the catalog command
pub async fn execute(args: &CatalogArgs, _global: &GlobalArgs) -> Result<()> {
    let catalog = common::baked_catalog()?;

    if let Some(raw) = &args.show {
        let version: MigrationVersion = raw
            .parse()
            .with_context(|| format!("Invalid migration version '{raw}'"))?;
        let migration = catalog
            .get(version)
            .with_context(|| format!("No migration {version} in the catalog"))?;
        println!("-- {}", migration.label());
        println!("{}", migration.sql.trim_end());
        return Ok(());
    }

    let entries: Vec<CatalogEntry<'_>> = catalog
        .iter()
        .map(|m| CatalogEntry {
            version: m.version,
            name: &m.name,
            checksum: m.checksum(),
            transactional: m.transactional,
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{}  {:<24} {}{}",
            entry.version,
            entry.name,
            &entry.checksum[..12],
            if entry.transactional { "" } else { "  non-transactional" }
        );
    }
    Ok(())
}
