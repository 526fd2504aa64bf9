//! schemagate CLI - reconcile the database schema before the application starts

use clap::Parser;
use std::process;

mod catalog;
mod cli;
mod commands;
mod logging;

use cli::Cli;
use commands::common::ExitCode;
use commands::{catalog as catalog_cmd, plan, status, up, verify};

#[tokio::main]
async fn main() -> process::ExitCode {
    let cli = Cli::parse();
    logging::init(cli.global.verbose);

    let result = match &cli.command {
        cli::Commands::Up(args) => up::execute(args, &cli.global).await,
        cli::Commands::Plan(args) => plan::execute(args, &cli.global).await,
        cli::Commands::Status(args) => status::execute(args, &cli.global).await,
        cli::Commands::Verify(args) => verify::execute(args, &cli.global).await,
        cli::Commands::Catalog(args) => catalog_cmd::execute(args, &cli.global).await,
    };

    match result {
        Ok(()) => process::ExitCode::SUCCESS,
        Err(err) => {
            if let Some(ExitCode(code)) = err.downcast_ref::<ExitCode>() {
                return process::ExitCode::from(exit_status_byte(*code));
            }
            eprintln!("Error: {err:#}");
            process::ExitCode::FAILURE
        }
    }
}

fn exit_status_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
