//! Session info repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use crate::error::Result;
use crate::models::{NewSession, SessionInfo};
use crate::util::unix_timestamp_millis;
use libsql::{Connection, Value};

use super::result_repository::{optional_real, optional_text, value_as_real, value_as_text};

/// Trait for session audit trail operations (async)
#[allow(async_fn_in_trait)]
pub trait SessionRepository {
    /// Append a session record
    async fn insert(&self, session: &NewSession) -> Result<SessionInfo>;

    /// Most recent sessions first
    async fn list(&self, limit: usize) -> Result<Vec<SessionInfo>>;
}

/// libSQL implementation of `SessionRepository`
pub struct LibSqlSessionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSessionRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SessionRepository for LibSqlSessionRepository<'_> {
    async fn insert(&self, session: &NewSession) -> Result<SessionInfo> {
        let created_at = unix_timestamp_millis();
        let params: Vec<Value> = vec![
            Value::Text(session.race_type.clone()),
            optional_text(session.headline.as_deref()),
            optional_real(session.track_distance),
            optional_text(session.location.as_deref()),
            optional_text(session.device_port.as_deref()),
            Value::Integer(created_at),
        ];

        self.conn
            .execute(
                "INSERT INTO session_info (race_type, headline, track_distance, location,
                    device_port, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params,
            )
            .await?;

        Ok(SessionInfo {
            id: self.conn.last_insert_rowid(),
            race_type: session.race_type.clone(),
            headline: session.headline.clone(),
            track_distance: session.track_distance,
            location: session.location.clone(),
            device_port: session.device_port.clone(),
            created_at,
        })
    }

    async fn list(&self, limit: usize) -> Result<Vec<SessionInfo>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, race_type, headline, track_distance, location, device_port, created_at
                 FROM session_info
                 ORDER BY id DESC
                 LIMIT ?",
                [limit as i64],
            )
            .await?;

        let mut sessions = Vec::new();
        while let Some(row) = rows.next().await? {
            sessions.push(SessionInfo {
                id: row.get(0)?,
                race_type: row.get(1)?,
                headline: value_as_text(row.get_value(2)?),
                track_distance: value_as_real(row.get_value(3)?),
                location: value_as_text(row.get_value(4)?),
                device_port: value_as_text(row.get_value(5)?),
                created_at: row.get(6)?,
            });
        }
        Ok(sessions)
    }
}
