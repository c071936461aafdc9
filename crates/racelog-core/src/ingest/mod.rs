//! Timing device telemetry.
//!
//! The device writes one JSON object per line, either a `player_info` result
//! or a `status` update. [`RaceSession`] turns those into result records for
//! the sync coordinator.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::config::SessionConfig;
use crate::models::ResultRecord;
use crate::util::compact_text;

/// Status text the device sends when announcing the winner
const WINNER_MARKER: &str = "wins!!";

/// Per-player result as reported by the device
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerInfo {
    pub player_number: u32,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub race_time: Option<f64>,
    #[serde(default)]
    pub reaction_time: Option<f64>,
    #[serde(default)]
    pub lap_time: Option<f64>,
    #[serde(default)]
    pub eliminated: bool,
    #[serde(default)]
    pub player_id: Option<String>,
}

/// One decoded device line
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Player(PlayerInfo),
    Status(String),
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    player_info: Option<PlayerInfo>,
    #[serde(default)]
    status: Option<String>,
}

/// Decode one line of device output.
///
/// Blank lines yield `None`. Lines that are not a JSON object with a
/// `player_info` or `status` field are logged and dropped.
pub fn parse_device_line(line: &str) -> Option<DeviceEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let message = match serde_json::from_str::<RawMessage>(line) {
        Ok(message) => message,
        Err(error) => {
            tracing::warn!("Dropping malformed device line '{}': {}", compact_text(line), error);
            return None;
        }
    };

    if let Some(player) = message.player_info {
        if player.player_number == 0 {
            tracing::warn!("Dropping player_info without a player number");
            return None;
        }
        return Some(DeviceEvent::Player(player));
    }
    if let Some(status) = message.status {
        return Some(DeviceEvent::Status(status.trim().to_string()));
    }

    tracing::debug!("Ignoring device line with no known fields: {}", compact_text(line));
    None
}

/// What the caller should do with a decoded event
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// A new result to hand to the sync coordinator
    Record(Box<ResultRecord>),
    /// The player already has a result in this race
    Duplicate(u32),
    RaceStarted,
    RaceReset,
    /// Winner announcement, e.g. `Player 2 wins!!`
    Winner(String),
    /// Any other status text, shown as-is
    Status(String),
}

/// State of the race currently being timed
#[derive(Debug, Clone)]
pub struct RaceSession {
    race_type: String,
    track_distance: Option<f64>,
    seen: HashSet<u32>,
}

impl RaceSession {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            race_type: config.race_type.clone(),
            track_distance: config.track_distance,
            seen: HashSet::new(),
        }
    }

    pub fn race_type(&self) -> &str {
        &self.race_type
    }

    /// Players with a recorded result in the current race
    pub fn recorded_players(&self) -> usize {
        self.seen.len()
    }

    /// Apply one device event. Results are dated `finished_on`, the day the
    /// device reported them.
    pub fn accept(&mut self, event: DeviceEvent, finished_on: NaiveDate) -> SessionAction {
        match event {
            DeviceEvent::Player(player) => self.accept_player(player, finished_on),
            DeviceEvent::Status(status) => self.accept_status(status),
        }
    }

    fn accept_player(&mut self, player: PlayerInfo, finished_on: NaiveDate) -> SessionAction {
        if !self.seen.insert(player.player_number) {
            tracing::warn!(
                "Ignoring repeated result for player {} in this race",
                player.player_number
            );
            return SessionAction::Duplicate(player.player_number);
        }

        let mut record = ResultRecord::new(player.player_number, &self.race_type, finished_on);
        record.player_id = player.player_id;
        record.position = player.position;
        record.race_time = player.race_time;
        record.reaction_time = player.reaction_time;
        record.lap_time = player.lap_time;
        record.eliminated = player.eliminated;
        record.track_distance = self.track_distance;

        tracing::debug!(
            "Player {} finished: {}",
            record.player_number,
            record.status_label()
        );
        SessionAction::Record(Box::new(record))
    }

    fn accept_status(&mut self, status: String) -> SessionAction {
        match status.as_str() {
            "Start" => {
                self.seen.clear();
                tracing::info!("{} race started", self.race_type);
                SessionAction::RaceStarted
            }
            "Reset" => {
                self.seen.clear();
                tracing::info!("Race reset");
                SessionAction::RaceReset
            }
            _ if status.contains(WINNER_MARKER) => {
                tracing::info!("{} {}", self.race_type, status);
                SessionAction::Winner(status)
            }
            _ => SessionAction::Status(status),
        }
    }
}
