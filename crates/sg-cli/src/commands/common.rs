//! Shared setup for every command: configuration, store, catalog, shutdown.

use crate::cli::GlobalArgs;
use anyhow::{Context, Result};
use sg_core::config::{ENV_DATABASE_PATH, ENV_DATABASE_URL};
use sg_core::{Catalog, Config, CoreError, DbType};
use sg_db::Store;
use sg_engine::retry::connect_with_retry;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Exit code to return from `main` after the error has already been reported.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; the message was printed before returning.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Load `schemagate.yml` and apply environment and command-line overrides.
pub(crate) fn load_config(global: &GlobalArgs) -> Result<Config> {
    resolve_config(global, |key| std::env::var(key).ok())
}

/// [`load_config`] with an injectable environment lookup.
pub(crate) fn resolve_config<F>(global: &GlobalArgs, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let loaded = match &global.config {
        Some(path) => Config::load(Path::new(path)),
        None => Config::load_from_dir(Path::new(&global.project_dir)),
    };

    let mut config = match loaded {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) if has_database_override(global, &lookup) => {
            log::debug!("No configuration at {path}; using defaults with the given database");
            Config::default()
        }
        Err(err) => return Err(err).context("Failed to load configuration"),
    };

    config
        .apply_overrides_from(&lookup)
        .context("Invalid environment override")?;

    if let Some(url) = &global.database_url {
        config.database.url = Some(url.clone());
        config.database.db_type = DbType::Postgres;
    }
    if let Some(path) = &global.database_path {
        config.database.path = path.clone();
        config.database.db_type = DbType::DuckDb;
    }
    if let Some(max_retries) = global.max_retries {
        config.reconcile.max_retries = max_retries;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn has_database_override<F>(global: &GlobalArgs, lookup: &F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    global.database_url.is_some()
        || global.database_path.is_some()
        || lookup(ENV_DATABASE_URL).is_some()
        || lookup(ENV_DATABASE_PATH).is_some()
}

/// Open the configured store. Does not connect.
pub(crate) fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    sg_db::open_store(&config.database, &config.reconcile).with_context(|| {
        format!(
            "Failed to open {} store at {}",
            config.database.db_type,
            config.database.display_target()
        )
    })
}

/// The migration catalog baked into this binary.
pub(crate) fn baked_catalog() -> Result<Arc<Catalog>> {
    let catalog = crate::catalog::baked().context("Baked migration catalog is invalid")?;
    Ok(Arc::new(catalog))
}

/// Token cancelled on the first Ctrl-C.
pub(crate) fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received; shutting down");
            trigger.cancel();
        }
    });
    token
}

/// Wait for the store with the configured backoff, for read-only commands.
pub(crate) async fn connect(
    store: &dyn Store,
    config: &Config,
    shutdown: &CancellationToken,
) -> Result<()> {
    let run_id = Uuid::new_v4();
    connect_with_retry(store, &config.reconcile.backoff_policy(), shutdown, &run_id)
        .await
        .with_context(|| format!("Could not reach {}", store.target()))?;
    Ok(())
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
