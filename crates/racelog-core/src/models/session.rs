//! Session info model

use serde::{Deserialize, Serialize};

/// Operator-entered metadata for one race session
///
/// Written once when a session starts. Local audit trail only, never synced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Row identifier
    pub id: i64,
    /// Race type selected for the session
    pub race_type: String,
    /// Headline shown while waiting for the race to start
    pub headline: Option<String>,
    /// Track distance in meters
    pub track_distance: Option<f64>,
    /// Venue or location name
    pub location: Option<String>,
    /// Port the timing device is connected on
    pub device_port: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

/// Session metadata before it has been recorded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub race_type: String,
    pub headline: Option<String>,
    pub track_distance: Option<f64>,
    pub location: Option<String>,
    pub device_port: Option<String>,
}
