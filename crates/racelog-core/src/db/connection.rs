//! Database connection management

use crate::error::{Error, Result};
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::{Path, PathBuf};

use super::migrations;

/// How long a connection waits on a locked database before giving up
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Database wrapper for a local libSQL file
///
/// Connections are not cached: every caller checks out its own handle with
/// [`Database::connect`] and drops it when the operation finishes, so the
/// write-through path and the retry sweep never share one.
pub struct Database {
    db: LibSqlDatabase,
    path: PathBuf,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;

        let database = Self { db, path };
        let conn = database.connect().await?;
        // WAL is persistent, so it only needs to be set once per file
        if let Err(error) = pragma_query(&conn, "PRAGMA journal_mode = WAL;").await {
            tracing::warn!("Could not enable WAL journal: {}", error);
        }
        migrations::run(&conn).await?;
        Ok(database)
    }

    /// Check out a fresh, configured connection
    pub async fn connect(&self) -> Result<Connection> {
        let conn = self.db.connect()?;
        configure(&conn).await?;
        Ok(conn)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Per-connection pragmas
async fn configure(conn: &Connection) -> Result<()> {
    pragma_query(conn, &format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};")).await?;
    // Commits must reach the disk before a write is acknowledged
    conn.execute("PRAGMA synchronous = FULL;", ())
        .await
        .map_err(|error| Error::Database(format!("failed to configure connection: {error}")))?;
    conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
    Ok(())
}

/// Run a pragma that reports its new value as a row
async fn pragma_query(conn: &Connection, pragma: &str) -> Result<()> {
    let mut rows = conn.query(pragma, ()).await?;
    while rows.next().await?.is_some() {}
    Ok(())
}
