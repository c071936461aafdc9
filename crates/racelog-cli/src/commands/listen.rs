use std::path::Path;

use chrono::Local;
use racelog_core::config::{SessionConfig, SyncSettings};
use racelog_core::ingest::{parse_device_line, RaceSession, SessionAction};
use racelog_core::models::RecordState;
use racelog_core::sync::{ConnectivityProbe, Offline, RemoteSink, SyncCoordinator, Unconfigured};
use racelog_core::ResultRecord;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::commands::common::{format_seconds, open_store, remote_stack};
use crate::error::CliError;

/// Counters printed when the device stream ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListenSummary {
    pub recorded: usize,
    pub synced: usize,
    pub duplicates: usize,
}

pub async fn run_listen(
    input: Option<&Path>,
    config_path: &Path,
    port: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let session_config = SessionConfig::load(config_path)?;
    let store = open_store(db_path).await?;
    let session = store
        .record_session(&session_config.to_new_session(port))
        .await?;
    tracing::info!("Recording {} session {}", session.race_type, session.id);

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|source| CliError::DeviceInput {
                    path: path.display().to_string(),
                    source,
                })?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let settings = SyncSettings::default();
    let summary = match remote_stack(&settings)? {
        Some(remote) => {
            tracing::info!("Replicating results to {}", remote.url);
            let coordinator = SyncCoordinator::start(store, remote.probe, remote.sink, settings);
            listen_until_closed(reader, &session_config, coordinator).await?
        }
        None => {
            tracing::warn!("SUPABASE_URL/SUPABASE_KEY not set, results stay local");
            let coordinator = SyncCoordinator::start(store, Offline, Unconfigured, settings);
            listen_until_closed(reader, &session_config, coordinator).await?
        }
    };

    println!(
        "Recorded {} results ({} synced, {} duplicates ignored)",
        summary.recorded, summary.synced, summary.duplicates
    );
    Ok(())
}

/// Feed device lines through the coordinator until EOF or Ctrl-C, then stop
/// the sweep worker.
pub async fn listen_until_closed<Rd, P, R>(
    reader: Rd,
    session_config: &SessionConfig,
    coordinator: SyncCoordinator<P, R>,
) -> Result<ListenSummary, CliError>
where
    Rd: AsyncBufRead + Unpin,
    P: ConnectivityProbe,
    R: RemoteSink,
{
    let result = pump_lines(reader, session_config, &coordinator).await;
    coordinator.shutdown().await;
    result
}

async fn pump_lines<Rd, P, R>(
    mut reader: Rd,
    session_config: &SessionConfig,
    coordinator: &SyncCoordinator<P, R>,
) -> Result<ListenSummary, CliError>
where
    Rd: AsyncBufRead + Unpin,
    P: ConnectivityProbe,
    R: RemoteSink,
{
    let mut session = RaceSession::new(session_config);
    let mut summary = ListenSummary::default();
    let mut buf = Vec::new();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        buf.clear();
        let read = tokio::select! {
            read = reader.read_until(b'\n', &mut buf) => read?,
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted, stopping");
                break;
            }
        };
        if read == 0 {
            break;
        }

        // Serial noise can produce bytes that are not UTF-8
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(error) => {
                tracing::warn!("Dropping device line that is not valid UTF-8: {}", error);
                continue;
            }
        };
        let Some(event) = parse_device_line(line) else {
            continue;
        };

        match session.accept(event, Local::now().date_naive()) {
            SessionAction::Record(record) => {
                let outcome = coordinator.record_result(&record).await?;
                summary.recorded += 1;
                if outcome.state == RecordState::Synced {
                    summary.synced += 1;
                }
                println!("{}", format_recorded(&record, outcome.state));
            }
            SessionAction::Duplicate(_) => summary.duplicates += 1,
            SessionAction::RaceStarted => println!("{} race started", session.race_type()),
            SessionAction::RaceReset => println!("Race reset"),
            SessionAction::Winner(text) => println!("{} {text}", session.race_type()),
            SessionAction::Status(text) => println!("{text}"),
        }
    }

    Ok(summary)
}

pub fn format_recorded(record: &ResultRecord, state: RecordState) -> String {
    format!(
        "Player {}  {:<11}  time {}  reaction {}  lap {}  [{state}]",
        record.player_number,
        record.status_label(),
        format_seconds(record.race_time),
        format_seconds(record.reaction_time),
        format_seconds(record.lap_time),
    )
}

