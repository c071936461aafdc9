//! Result repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use crate::error::{Error, Result};
use crate::models::{ResultRecord, StoredResult, SyncCounts};
use chrono::NaiveDate;
use libsql::{Connection, Row, Value};

const SELECT_COLUMNS: &str = "SELECT id, record_key, player_id, player_number, race_date, race_type,
        position, race_time, reaction_time, lap_time, track_distance, eliminated, synced
     FROM player_data";

/// Trait for result storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ResultRepository {
    /// Insert a new row with the given synced flag, returning its id
    async fn insert(&self, record: &ResultRecord, synced: bool) -> Result<i64>;

    /// Get a row by id
    async fn get(&self, id: i64) -> Result<Option<StoredResult>>;

    /// All rows not yet acknowledged by the remote store, oldest first
    async fn list_unsynced(&self) -> Result<Vec<StoredResult>>;

    /// All rows, newest first
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<StoredResult>>;

    /// Flag a row as synced; returns whether the row changed
    async fn mark_synced(&self, id: i64) -> Result<bool>;

    /// Remove a row outright
    async fn delete(&self, id: i64) -> Result<()>;

    /// Row counts by synced flag
    async fn counts(&self) -> Result<SyncCounts>;
}

/// libSQL implementation of `ResultRepository`
pub struct LibSqlResultRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlResultRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn query_results(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<StoredResult>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(parse_result(&row)?);
        }
        Ok(results)
    }
}

impl ResultRepository for LibSqlResultRepository<'_> {
    async fn insert(&self, record: &ResultRecord, synced: bool) -> Result<i64> {
        let params: Vec<Value> = vec![
            Value::Text(record.record_key.as_str()),
            optional_text(record.player_id.as_deref()),
            Value::Integer(i64::from(record.player_number)),
            Value::Text(record.race_date.format("%Y-%m-%d").to_string()),
            Value::Text(record.race_type.clone()),
            Value::Integer(i64::from(record.position)),
            optional_real(record.race_time),
            optional_real(record.reaction_time),
            optional_real(record.lap_time),
            optional_real(record.track_distance),
            Value::Integer(i64::from(record.eliminated)),
            Value::Integer(i64::from(synced)),
        ];

        self.conn
            .execute(
                "INSERT INTO player_data (record_key, player_id, player_number, race_date,
                    race_type, position, race_time, reaction_time, lap_time, track_distance,
                    eliminated, synced)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params,
            )
            .await?;

        Ok(self.conn.last_insert_rowid())
    }

    async fn get(&self, id: i64) -> Result<Option<StoredResult>> {
        let mut results = self
            .query_results(&format!("{SELECT_COLUMNS} WHERE id = ?"), [id])
            .await?;
        Ok(results.pop())
    }

    async fn list_unsynced(&self) -> Result<Vec<StoredResult>> {
        self.query_results(
            &format!("{SELECT_COLUMNS} WHERE synced = 0 ORDER BY id ASC"),
            (),
        )
        .await
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<StoredResult>> {
        self.query_results(
            &format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ? OFFSET ?"),
            [limit as i64, offset as i64],
        )
        .await
    }

    async fn mark_synced(&self, id: i64) -> Result<bool> {
        // Only ever moves 0 -> 1
        let changed = self
            .conn
            .execute(
                "UPDATE player_data SET synced = 1 WHERE id = ? AND synced = 0",
                [id],
            )
            .await?;
        Ok(changed > 0)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM player_data WHERE id = ?", [id])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn counts(&self) -> Result<SyncCounts> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*), COALESCE(SUM(synced), 0) FROM player_data",
                (),
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(SyncCounts::default());
        };

        let total = to_u64(row.get::<i64>(0)?, "row count")?;
        let synced = to_u64(row.get::<i64>(1)?, "synced count")?;
        Ok(SyncCounts {
            total,
            synced,
            unsynced: total.saturating_sub(synced),
        })
    }
}

/// Parse a stored result from a database row
fn parse_result(row: &Row) -> Result<StoredResult> {
    let record_key: String = row.get(1)?;
    let race_date: String = row.get(4)?;

    let record = ResultRecord {
        record_key: record_key
            .parse()
            .map_err(|_| Error::Database(format!("invalid record key: {record_key}")))?,
        player_id: value_as_text(row.get_value(2)?),
        player_number: to_u32(row.get::<i64>(3)?, "player_number")?,
        race_date: NaiveDate::parse_from_str(&race_date, "%Y-%m-%d")
            .map_err(|_| Error::Database(format!("invalid race date: {race_date}")))?,
        race_type: row.get(5)?,
        position: to_u32(row.get::<i64>(6)?, "position")?,
        race_time: value_as_real(row.get_value(7)?),
        reaction_time: value_as_real(row.get_value(8)?),
        lap_time: value_as_real(row.get_value(9)?),
        track_distance: value_as_real(row.get_value(10)?),
        eliminated: row.get::<i64>(11)? != 0,
    };

    Ok(StoredResult {
        id: row.get(0)?,
        record,
        synced: row.get::<i64>(12)? != 0,
    })
}

pub(crate) fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

pub(crate) fn optional_real(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}

pub(crate) fn value_as_text(value: Value) -> Option<String> {
    match value {
        Value::Text(text) => Some(text),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn value_as_real(value: Value) -> Option<f64> {
    match value {
        Value::Real(real) => Some(real),
        Value::Integer(integer) => Some(integer as f64),
        _ => None,
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Database(format!("{column} out of range: {value}")))
}

fn to_u64(value: i64, column: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::Database(format!("{column} out of range: {value}")))
}
