use std::path::Path;

use racelog_core::config::SyncSettings;
use racelog_core::sync::{SweepReport, SyncEngine};

use crate::commands::common::{open_store, remote_stack};
use crate::error::CliError;

pub async fn run_sync(db_path: &Path) -> Result<(), CliError> {
    let settings = SyncSettings::default();
    let Some(remote) = remote_stack(&settings)? else {
        return Err(CliError::SyncNotConfigured);
    };

    let store = open_store(db_path).await?;
    let engine = SyncEngine::new(store, remote.probe, remote.sink, settings);
    let report = engine.sweep_once().await;

    println!("{}", format_sweep_report(&report));
    Ok(())
}

pub fn format_sweep_report(report: &SweepReport) -> String {
    if report.skipped_offline {
        return "Remote unreachable, results stay queued locally".to_string();
    }
    if report.attempted == 0 {
        return "Nothing to sync".to_string();
    }

    let mut line = format!(
        "Synced {} of {} results in {} ms",
        report.synced,
        report.attempted,
        report.elapsed.as_millis()
    );
    if report.failed > 0 {
        line.push_str(&format!(" ({} still pending)", report.failed));
    }
    line
}
