use std::path::Path;

use racelog_core::config::SyncSettings;
use racelog_core::sync::ConnectivityProbe;

use crate::commands::common::{open_store, remote_stack};
use crate::error::CliError;

pub async fn run_status(db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let counts = store.counts().await?;

    println!("Database: {}", store.path().display());
    println!(
        "Results:  {} total, {} synced, {} pending",
        counts.total, counts.synced, counts.unsynced
    );

    let settings = SyncSettings::default();
    match remote_stack(&settings)? {
        Some(remote) => {
            let state = if remote.probe.is_reachable().await {
                "online"
            } else {
                "offline"
            };
            println!("Remote:   {} ({state})", remote.url);
        }
        None => println!("Remote:   not configured (local-only)"),
    }
    Ok(())
}
