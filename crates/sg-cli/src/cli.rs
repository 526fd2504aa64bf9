//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand};

/// schemagate - reconcile a database schema before the application starts
#[derive(Parser, Debug)]
#[command(name = "sg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// PostgreSQL connection string (overrides config and environment)
    #[arg(long, global = true, conflicts_with = "database_path")]
    pub database_url: Option<String>,

    /// DuckDB database file (overrides config and environment)
    #[arg(long, global = true)]
    pub database_path: Option<String>,

    /// Connection attempts before giving up
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile the schema, then optionally start the application
    Up(UpArgs),

    /// Show pending migrations without applying them
    Plan(PlanArgs),

    /// Compare the ledger with the catalog
    Status(StatusArgs),

    /// Fail if the ledger has drifted or checksums changed
    Verify(VerifyArgs),

    /// List the baked migration catalog
    Catalog(CatalogArgs),
}

/// Arguments for the up command
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Application command started once the schema is ready
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Arguments for the plan command
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the verify command
#[derive(Args, Debug)]
pub struct VerifyArgs {}

/// Arguments for the catalog command
#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the SQL of one migration (e.g. `3` or `v003`)
    #[arg(long, value_name = "VERSION")]
    pub show: Option<String>,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
