//! racelog CLI - record race timing results from the command line
//!
//! Reads timing device output, stores every result locally, and replicates
//! results to the remote backend whenever it is reachable.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::delete::run_delete;
use crate::commands::list::{run_list, run_pending};
use crate::commands::listen::run_listen;
use crate::commands::sessions::run_sessions;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let default_directive = "racelog=info"
        .parse::<Directive>()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_directive))
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path)?;

    match cli.command {
        Commands::Listen {
            input,
            config,
            port,
        } => run_listen(input.as_deref(), &config, port, &db_path).await?,
        Commands::Pending { json } => run_pending(json, &db_path).await?,
        Commands::List { limit, json } => run_list(limit, json, &db_path).await?,
        Commands::Sync => run_sync(&db_path).await?,
        Commands::Status => run_status(&db_path).await?,
        Commands::Delete { id } => run_delete(id, &db_path).await?,
        Commands::Sessions { limit, json } => run_sessions(limit, json, &db_path).await?,
    }

    Ok(())
}
