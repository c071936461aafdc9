use std::io;

use racelog_core::sync::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] racelog_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Result not found for id: {0}")]
    ResultNotFound(i64),
    #[error("Failed to open device input {path}: {source}")]
    DeviceInput { path: String, source: io::Error },
    #[error("Could not resolve a data directory; pass --db-path or set RACELOG_DB_PATH")]
    NoDataDir,
    #[error("Sync is not configured. Set SUPABASE_URL and SUPABASE_KEY to enable replication.")]
    SyncNotConfigured,
}
