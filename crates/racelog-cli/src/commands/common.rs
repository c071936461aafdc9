use std::env;
use std::path::{Path, PathBuf};

use racelog_core::config::{RemoteConfig, SyncSettings};
use racelog_core::services::LocalStore;
use racelog_core::sync::{HttpProbe, SupabaseSink};
use racelog_core::{SessionInfo, StoredResult};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ResultListItem {
    pub id: i64,
    pub record_key: String,
    pub player_number: u32,
    pub player_id: Option<String>,
    pub race_date: String,
    pub race_type: String,
    pub position: u32,
    pub race_time: Option<f64>,
    pub reaction_time: Option<f64>,
    pub lap_time: Option<f64>,
    pub track_distance: Option<f64>,
    pub eliminated: bool,
    pub synced: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionListItem {
    pub id: i64,
    pub race_type: String,
    pub headline: Option<String>,
    pub track_distance: Option<f64>,
    pub location: Option<String>,
    pub device_port: Option<String>,
    pub created_at: i64,
    pub created_at_iso: String,
}

/// Probe and sink for the configured remote backend
pub struct RemoteStack {
    pub url: String,
    pub probe: HttpProbe,
    pub sink: SupabaseSink,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    cli_db_path
        .or_else(|| env::var_os("RACELOG_DB_PATH").map(PathBuf::from))
        .or_else(default_db_path)
        .ok_or(CliError::NoDataDir)
}

pub fn default_db_path() -> Option<PathBuf> {
    Some(dirs::data_dir()?.join("racelog").join("racelog.db"))
}

pub async fn open_store(path: &Path) -> Result<LocalStore, CliError> {
    Ok(LocalStore::open(path).await?)
}

/// Build the remote probe and sink from the environment.
///
/// `None` means no remote is configured and results stay local.
pub fn remote_stack(settings: &SyncSettings) -> Result<Option<RemoteStack>, CliError> {
    let Some(config) = RemoteConfig::from_env()? else {
        return Ok(None);
    };

    Ok(Some(RemoteStack {
        url: config.url.clone(),
        probe: HttpProbe::new(settings.probe_url.clone(), settings.probe_timeout)?,
        sink: SupabaseSink::new(config, settings.remote_timeout)?,
    }))
}

pub fn result_to_list_item(result: &StoredResult) -> ResultListItem {
    let record = &result.record;
    ResultListItem {
        id: result.id,
        record_key: record.record_key.to_string(),
        player_number: record.player_number,
        player_id: record.player_id.clone(),
        race_date: record.race_date.to_string(),
        race_type: record.race_type.clone(),
        position: record.position,
        race_time: record.race_time,
        reaction_time: record.reaction_time,
        lap_time: record.lap_time,
        track_distance: record.track_distance,
        eliminated: record.eliminated,
        synced: result.synced,
    }
}

pub fn format_result_lines(results: &[StoredResult]) -> Vec<String> {
    results
        .iter()
        .map(|result| {
            let record = &result.record;
            let player = format!("P{}", record.player_number);
            let status = record.status_label();
            let race_time = format_seconds(record.race_time);
            let state = if result.synced { "synced" } else { "pending" };
            format!(
                "{:>6}  {}  {:<12}  {player:<4}  {status:<11}  {race_time:>8}  {state}",
                result.id, record.race_date, record.race_type
            )
        })
        .collect()
}

pub fn session_to_list_item(session: &SessionInfo) -> SessionListItem {
    SessionListItem {
        id: session.id,
        race_type: session.race_type.clone(),
        headline: session.headline.clone(),
        track_distance: session.track_distance,
        location: session.location.clone(),
        device_port: session.device_port.clone(),
        created_at: session.created_at,
        created_at_iso: format_timestamp(session.created_at),
    }
}

pub fn format_session_lines(sessions: &[SessionInfo]) -> Vec<String> {
    sessions
        .iter()
        .map(|session| {
            let distance = session
                .track_distance
                .map_or_else(|| "-".to_string(), |meters| format!("{meters}m"));
            let location = session.location.as_deref().unwrap_or("-");
            let port = session.device_port.as_deref().unwrap_or("-");
            format!(
                "{:>4}  {}  {:<12}  {distance:>6}  {location:<16}  {port}",
                session.id,
                format_timestamp(session.created_at),
                session.race_type
            )
        })
        .collect()
}

pub fn format_seconds(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |seconds| format!("{seconds:.2}s"))
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
