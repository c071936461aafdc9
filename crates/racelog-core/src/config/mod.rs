//! Runtime configuration.
//!
//! Three independent pieces:
//! - [`RemoteConfig`]: where results are replicated to, read from the
//!   environment (`SUPABASE_URL`, `SUPABASE_KEY`, ...).
//! - [`SyncSettings`]: sweep cadence and network timeouts.
//! - [`SessionConfig`]: operator session defaults from `config.json`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::NewSession;
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_RESULTS_TABLE: &str = "player_data";
pub const DEFAULT_PROBE_URL: &str = "https://www.google.com";
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote backend (Supabase `PostgREST`) settings
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// API key sent as `apikey` and bearer token
    pub api_key: String,
    /// Table results are inserted into
    pub table: String,
    /// Optional database function called after successful inserts
    pub aggregate_function: Option<String>,
    /// Optional unique column used to merge duplicate inserts remotely
    pub conflict_column: Option<String>,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field("table", &self.table)
            .field("aggregate_function", &self.aggregate_function)
            .field("conflict_column", &self.conflict_column)
            .finish()
    }
}

impl RemoteConfig {
    /// Create a config for the default results table
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let url = normalize_text_option(Some(url.into()))
            .ok_or_else(|| Error::Config("remote URL must not be empty".to_string()))?;
        if !is_http_url(&url) {
            return Err(Error::Config(
                "remote URL must include http:// or https://".to_string(),
            ));
        }
        let api_key = normalize_text_option(Some(api_key.into()))
            .ok_or_else(|| Error::Config("remote API key must not be empty".to_string()))?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            api_key,
            table: DEFAULT_RESULTS_TABLE.to_string(),
            aggregate_function: None,
            conflict_column: None,
        })
    }

    /// Read the remote config from the process environment.
    ///
    /// Returns `Ok(None)` when `SUPABASE_URL` or `SUPABASE_KEY` is unset, which
    /// means the app runs local-only.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the remote config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let url = normalize_text_option(lookup("SUPABASE_URL"));
        let key = normalize_text_option(lookup("SUPABASE_KEY"));
        let (Some(url), Some(key)) = (url, key) else {
            return Ok(None);
        };

        let mut config = Self::new(url, key)?;
        if let Some(table) = normalize_text_option(lookup("RACELOG_RESULTS_TABLE")) {
            config.table = table;
        }
        config.aggregate_function = normalize_text_option(lookup("RACELOG_AGGREGATE_FUNCTION"));
        config.conflict_column = normalize_text_option(lookup("RACELOG_CONFLICT_COLUMN"));
        Ok(Some(config))
    }

    /// Set the aggregation function triggered after inserts
    #[must_use]
    pub fn with_aggregate_function(mut self, function: impl Into<String>) -> Self {
        self.aggregate_function = Some(function.into());
        self
    }

    /// Merge duplicate inserts on this remote column
    #[must_use]
    pub fn with_conflict_column(mut self, column: impl Into<String>) -> Self {
        self.conflict_column = Some(column.into());
        self
    }
}

/// Sweep cadence and network timeouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Fixed period between retry sweeps (default: 60 seconds)
    pub sweep_interval: Duration,
    /// Endpoint used to decide whether we are online
    pub probe_url: String,
    /// Upper bound for the connectivity probe (default: 5 seconds)
    pub probe_timeout: Duration,
    /// Upper bound for every remote call (default: 10 seconds)
    pub remote_timeout: Duration,
    /// Call the aggregation function after successful inserts
    pub trigger_aggregation: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            trigger_aggregation: true,
        }
    }
}

impl SyncSettings {
    /// Set the retry sweep interval
    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the connectivity probe endpoint
    #[must_use]
    pub fn with_probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = url.into();
        self
    }

    /// Set the connectivity probe timeout
    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the timeout applied to remote calls
    #[must_use]
    pub const fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Disable the post-insert aggregation trigger
    #[must_use]
    pub const fn without_aggregation(mut self) -> Self {
        self.trigger_aggregation = false;
        self
    }
}

/// Operator session defaults, stored as `config.json` next to the app
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub race_type: String,
    #[serde(default)]
    pub ready_headline: Option<String>,
    #[serde(default)]
    pub track_distance: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
}

impl SessionConfig {
    /// Load and validate a session config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let payload = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("failed to read {}: {error}", path.display()))
        })?;
        Self::parse(&payload)
    }

    /// Parse a session config from a raw JSON payload
    pub fn parse(payload: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(payload)
            .map_err(|error| Error::Config(format!("invalid session config JSON: {error}")))?;

        config.race_type = normalize_text_option(Some(config.race_type))
            .ok_or_else(|| Error::Config("session field 'race_type' is required".to_string()))?;
        config.ready_headline = normalize_text_option(config.ready_headline);
        config.location = normalize_text_option(config.location);
        if config
            .track_distance
            .is_some_and(|distance| !distance.is_finite() || distance < 0.0)
        {
            return Err(Error::Config(
                "session field 'track_distance' must be a non-negative number".to_string(),
            ));
        }
        Ok(config)
    }

    /// Session metadata to write to the audit trail
    pub fn to_new_session(&self, device_port: Option<String>) -> NewSession {
        NewSession {
            race_type: self.race_type.clone(),
            headline: self.ready_headline.clone(),
            track_distance: self.track_distance,
            location: self.location.clone(),
            device_port: normalize_text_option(device_port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn remote_config_missing_env_is_local_only() {
        let config = RemoteConfig::from_lookup(lookup(&[("SUPABASE_URL", "https://x.supabase.co")]))
            .unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn remote_config_reads_optional_overrides() {
        let config = RemoteConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", " https://x.supabase.co/ "),
            ("SUPABASE_KEY", "anon"),
            ("RACELOG_RESULTS_TABLE", "race_results"),
            ("RACELOG_AGGREGATE_FUNCTION", "refresh_leaderboard"),
            ("RACELOG_CONFLICT_COLUMN", ""),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(config.url, "https://x.supabase.co");
        assert_eq!(config.table, "race_results");
        assert_eq!(
            config.aggregate_function.as_deref(),
            Some("refresh_leaderboard")
        );
        assert!(config.conflict_column.is_none());
    }

    #[test]
    fn remote_config_rejects_url_without_scheme() {
        let error = RemoteConfig::new("x.supabase.co", "anon").unwrap_err();
        assert!(error.to_string().contains("http"));
    }

    #[test]
    fn remote_config_debug_redacts_key() {
        let config = RemoteConfig::new("https://x.supabase.co", "secret-key").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn sync_settings_defaults() {
        let settings = SyncSettings::default();
        assert_eq!(settings.sweep_interval, Duration::from_secs(60));
        assert_eq!(settings.probe_timeout, Duration::from_secs(5));
        assert!(settings.trigger_aggregation);

        let custom = settings
            .with_sweep_interval(Duration::from_secs(5))
            .without_aggregation();
        assert_eq!(custom.sweep_interval, Duration::from_secs(5));
        assert!(!custom.trigger_aggregation);
    }

    #[test]
    fn session_config_parses_known_fields() {
        let config = SessionConfig::parse(
            r#"{ "race_type": "Sprint", "ready_headline": "Ready?", "track_distance": 60 }"#,
        )
        .unwrap();
        assert_eq!(config.race_type, "Sprint");
        assert_eq!(config.ready_headline.as_deref(), Some("Ready?"));
        assert_eq!(config.track_distance, Some(60.0));

        let session = config.to_new_session(Some(" COM6 ".to_string()));
        assert_eq!(session.device_port.as_deref(), Some("COM6"));
    }

    #[test]
    fn session_config_ignores_unrelated_keys() {
        let config = SessionConfig::parse(
            r#"{ "race_type": "Relay", "ready_headline": "Ready?", "serial_port": "COM6", "theme": "dark" }"#,
        )
        .unwrap();
        assert_eq!(config.race_type, "Relay");
        assert_eq!(config.ready_headline.as_deref(), Some("Ready?"));
    }

    #[test]
    fn session_config_rejects_blank_race_type_and_bad_distance() {
        assert!(SessionConfig::parse(r#"{ "race_type": "  " }"#).is_err());
        assert!(SessionConfig::parse(r#"{ "race_type": "Sprint", "track_distance": -1 }"#).is_err());
    }
}
