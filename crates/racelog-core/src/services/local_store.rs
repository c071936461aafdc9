//! Durable local result store shared by the write-through path and the sweep.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::db::{
    Database, LibSqlResultRepository, LibSqlSessionRepository, ResultRepository,
    SessionRepository,
};
use crate::models::{NewSession, ResultRecord, SessionInfo, StoredResult, SyncCounts};
use crate::Result;

/// Cloneable handle to the local result store.
///
/// Every operation checks out its own connection and drops it before
/// returning, so clones can be used from any task without lock contention.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Database>,
}

impl LocalStore {
    /// Open (and initialize) the store at the given filesystem path.
    pub async fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let db = Database::open(&db_path).await?;
        tracing::info!("Local result store ready at {}", db_path.display());
        Ok(Self { db: Arc::new(db) })
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Ensure the schema exists. Safe to call on every startup.
    pub async fn initialize(&self) -> Result<()> {
        drop(Database::open(self.db.path()).await?);
        Ok(())
    }

    /// Persist one result with the given synced flag; committed on return.
    pub async fn append(&self, record: &ResultRecord, synced: bool) -> Result<i64> {
        let conn = self.db.connect().await?;
        let repo = LibSqlResultRepository::new(&conn);
        let id = repo.insert(record, synced).await?;
        tracing::debug!(
            "Stored result {} for player {} (synced={})",
            id,
            record.player_number,
            synced
        );
        Ok(id)
    }

    /// Rows still waiting for remote acknowledgement, oldest first.
    pub async fn unsynced(&self) -> Result<Vec<StoredResult>> {
        let conn = self.db.connect().await?;
        let repo = LibSqlResultRepository::new(&conn);
        repo.list_unsynced().await
    }

    /// Flag one row as synced. Absent or already-synced rows are left alone.
    pub async fn mark_synced(&self, row_id: i64) -> Result<()> {
        let conn = self.db.connect().await?;
        let repo = LibSqlResultRepository::new(&conn);
        if !repo.mark_synced(row_id).await? {
            tracing::debug!("Row {} was already synced or no longer exists", row_id);
        }
        Ok(())
    }

    /// Remove a row. Maintenance only; the sync path never deletes.
    pub async fn delete(&self, row_id: i64) -> Result<()> {
        let conn = self.db.connect().await?;
        let repo = LibSqlResultRepository::new(&conn);
        repo.delete(row_id).await?;
        tracing::info!("Deleted result row {}", row_id);
        Ok(())
    }

    /// Fetch one row by id.
    pub async fn get(&self, row_id: i64) -> Result<Option<StoredResult>> {
        let conn = self.db.connect().await?;
        let repo = LibSqlResultRepository::new(&conn);
        repo.get(row_id).await
    }

    /// List rows newest-first.
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<StoredResult>> {
        let conn = self.db.connect().await?;
        let repo = LibSqlResultRepository::new(&conn);
        repo.list(limit, offset).await
    }

    /// Row counts by synced flag.
    pub async fn counts(&self) -> Result<SyncCounts> {
        let conn = self.db.connect().await?;
        let repo = LibSqlResultRepository::new(&conn);
        repo.counts().await
    }

    /// Append a session to the local audit trail.
    pub async fn record_session(&self, session: &NewSession) -> Result<SessionInfo> {
        let conn = self.db.connect().await?;
        let repo = LibSqlSessionRepository::new(&conn);
        repo.insert(session).await
    }

    /// List recorded sessions, newest first.
    pub async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionInfo>> {
        let conn = self.db.connect().await?;
        let repo = LibSqlSessionRepository::new(&conn);
        repo.list(limit).await
    }
}
