use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "racelog")]
#[command(about = "Record race timing results and replicate them to the remote backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read timing device output and record results
    Listen {
        /// Device output to read (stdin when omitted)
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,
        /// Session config file
        #[arg(short, long, value_name = "PATH", default_value = "config.json")]
        config: PathBuf,
        /// Name of the port the device is connected on, kept with the session
        #[arg(long, value_name = "NAME")]
        port: Option<String>,
    },
    /// List results the remote has not acknowledged yet
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent results
    List {
        /// Number of results to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Retry unsynced results now
    Sync,
    /// Show connectivity and local sync counts
    Status,
    /// Delete a result from the local store
    Delete {
        /// Local row id
        id: i64,
    },
    /// List recorded race sessions
    Sessions {
        /// Number of sessions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
