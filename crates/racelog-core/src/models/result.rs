//! Race result model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Idempotency key attached to a result when it is produced, using UUID v7
/// (time-sortable). Retried remote inserts reuse the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey(Uuid);

impl RecordKey {
    /// Create a new unique record key
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this key
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One participant's finished-race outcome
///
/// Serializes to exactly the payload the remote store accepts; local
/// bookkeeping (`id`, `synced`) lives on [`StoredResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Idempotency key, stable across retries
    pub record_key: RecordKey,
    /// Externally assigned player identifier, unknown at capture time if `None`
    pub player_id: Option<String>,
    /// Device-assigned seat (1..N), unique within one race session
    pub player_number: u32,
    /// Date the race finished
    pub race_date: NaiveDate,
    /// Race type selected for the session
    pub race_type: String,
    /// Finishing position, 0 means did not finish
    pub position: u32,
    /// Total race time in seconds
    pub race_time: Option<f64>,
    /// Start reaction time in seconds
    pub reaction_time: Option<f64>,
    /// Lap time in seconds
    pub lap_time: Option<f64>,
    /// Session-level track distance, copied onto each record
    pub track_distance: Option<f64>,
    /// Whether the player was eliminated
    pub eliminated: bool,
}

impl ResultRecord {
    /// Create a record for a player with a fresh record key
    #[must_use]
    pub fn new(player_number: u32, race_type: impl Into<String>, race_date: NaiveDate) -> Self {
        Self {
            record_key: RecordKey::new(),
            player_id: None,
            player_number,
            race_date,
            race_type: race_type.into(),
            position: 0,
            race_time: None,
            reaction_time: None,
            lap_time: None,
            track_distance: None,
            eliminated: false,
        }
    }

    /// Short status text used by displays: `Position N` or `OUT`
    #[must_use]
    pub fn status_label(&self) -> String {
        if self.eliminated {
            "OUT".to_string()
        } else {
            format!("Position {}", self.position)
        }
    }
}

/// A result row as persisted in the local store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    /// Monotonic local row id
    pub id: i64,
    /// The persisted record
    pub record: ResultRecord,
    /// Whether the remote store has acknowledged this row
    pub synced: bool,
}

/// Replication state of a produced record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// Produced, no replication attempt yet
    Pending,
    /// Acknowledged by the remote store
    Synced,
    /// Persisted locally and waiting for the retry sweep
    LocalOnly,
}

impl RecordState {
    /// Value stored in the `synced` column for this state
    #[must_use]
    pub const fn is_synced(self) -> bool {
        matches!(self, Self::Synced)
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Synced => write!(f, "synced"),
            Self::LocalOnly => write!(f, "local-only"),
        }
    }
}

/// Row counts for the passive sync indicator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub total: u64,
    pub synced: u64,
    pub unsynced: u64,
}
