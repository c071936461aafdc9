//! Write-through and retry sweep logic.
//!
//! Both paths converge on the [`LocalStore`]:
//!
//! ```text
//! produced ──probe──► online? ──insert ok──► append(synced=1)      SYNCED
//!                        │            └─fail─► append(synced=0)    LOCAL_ONLY
//!                        └─offline─────────► append(synced=0)      LOCAL_ONLY
//!
//! sweep: probe ─► unsynced() ─► insert per row ─► mark_synced(id) on success
//! ```

use std::time::Duration;

use tokio::time::{timeout, Instant};

use crate::config::SyncSettings;
use crate::error::Result;
use crate::models::{RecordState, ResultRecord};
use crate::services::LocalStore;

use super::probe::ConnectivityProbe;
use super::remote::{InsertAck, RemoteError, RemoteResult, RemoteSink};

/// Where a produced record ended up after the write-through attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Local row id
    pub row_id: i64,
    /// `Synced` or `LocalOnly`
    pub state: RecordState,
}

/// Summary of one sweep cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Unsynced rows the sweep tried to replicate
    pub attempted: usize,
    /// Rows acknowledged and flagged synced
    pub synced: usize,
    /// Rows left unsynced for the next cycle
    pub failed: usize,
    /// The probe said offline and nothing was attempted
    pub skipped_offline: bool,
    /// Wall time spent in the cycle
    pub elapsed: Duration,
    /// How long to wait before the next cycle
    pub next_sleep: Duration,
}

/// Sleep that keeps sweeps on a fixed cadence: `max(period - elapsed, 0)`
pub const fn next_sleep(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

/// Shared state behind both write paths
pub struct SyncEngine<P, R> {
    store: LocalStore,
    probe: P,
    sink: R,
    settings: SyncSettings,
}

impl<P: ConnectivityProbe, R: RemoteSink> SyncEngine<P, R> {
    pub const fn new(store: LocalStore, probe: P, sink: R, settings: SyncSettings) -> Self {
        Self {
            store,
            probe,
            sink,
            settings,
        }
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Probe connectivity, bounded by the configured probe timeout.
    pub async fn is_online(&self) -> bool {
        timeout(self.settings.probe_timeout, self.probe.is_reachable())
            .await
            .unwrap_or_else(|_| {
                tracing::debug!(
                    "Connectivity probe exceeded {:?}; assuming offline",
                    self.settings.probe_timeout
                );
                false
            })
    }

    /// Replicate a freshly produced record, falling back to local-only.
    ///
    /// Exactly one local row is written per call. The only error is a local
    /// storage failure; remote problems just leave the row `LocalOnly`.
    pub async fn write_through(&self, record: &ResultRecord) -> Result<WriteOutcome> {
        let state = if self.is_online().await {
            match self.insert_remote(record).await {
                Ok(ack) => {
                    if ack.duplicate {
                        tracing::debug!("Remote already held record {}", record.record_key);
                    }
                    RecordState::Synced
                }
                Err(error) => {
                    tracing::warn!(
                        "Remote insert for player {} failed, keeping it local: {}",
                        record.player_number,
                        error
                    );
                    RecordState::LocalOnly
                }
            }
        } else {
            tracing::info!(
                "Offline, storing result for player {} locally",
                record.player_number
            );
            RecordState::LocalOnly
        };

        let row_id = self
            .store
            .append(record, state.is_synced())
            .await
            .inspect_err(|error| {
                tracing::error!(
                    "Failed to persist result for player {}: {}",
                    record.player_number,
                    error
                );
            })?;

        if state.is_synced() {
            self.aggregate().await;
        }

        Ok(WriteOutcome { row_id, state })
    }

    /// One full sweep cycle: probe, then retry every unsynced row.
    pub async fn sweep_once(&self) -> SweepReport {
        let started = Instant::now();
        if !self.is_online().await {
            return self.skipped(started);
        }
        self.sweep_unsynced(started).await
    }

    /// Report for a cycle that found the remote unreachable
    pub(crate) fn skipped(&self, started: Instant) -> SweepReport {
        tracing::debug!("Sweep skipped: remote unreachable");
        self.finish(
            SweepReport {
                skipped_offline: true,
                ..SweepReport::default()
            },
            started,
        )
    }

    /// Retry every unsynced row; assumes the probe already passed.
    pub(crate) async fn sweep_unsynced(&self, started: Instant) -> SweepReport {
        let rows = match self.store.unsynced().await {
            Ok(rows) => rows,
            Err(error) => {
                tracing::error!("Sweep could not read unsynced results: {}", error);
                return self.finish(SweepReport::default(), started);
            }
        };

        let mut report = SweepReport {
            attempted: rows.len(),
            ..SweepReport::default()
        };

        // Payloads come from the persisted rows, not from any in-memory copy
        for row in rows {
            match self.insert_remote(&row.record).await {
                Ok(_) => match self.store.mark_synced(row.id).await {
                    Ok(()) => report.synced += 1,
                    Err(error) => {
                        tracing::error!(
                            "Row {} reached the remote but could not be flagged synced: {}",
                            row.id,
                            error
                        );
                        report.failed += 1;
                    }
                },
                Err(error) => {
                    tracing::warn!("Sweep insert for row {} failed: {}", row.id, error);
                    report.failed += 1;
                }
            }
        }

        if report.synced > 0 {
            self.aggregate().await;
        }

        self.finish(report, started)
    }

    fn finish(&self, mut report: SweepReport, started: Instant) -> SweepReport {
        report.elapsed = started.elapsed();
        report.next_sleep = next_sleep(self.settings.sweep_interval, report.elapsed);
        if report.attempted > 0 {
            tracing::info!(
                "Sweep synced {}/{} results in {:?}",
                report.synced,
                report.attempted,
                report.elapsed
            );
        }
        report
    }

    async fn insert_remote(&self, record: &ResultRecord) -> RemoteResult<InsertAck> {
        timeout(self.settings.remote_timeout, self.sink.insert(record))
            .await
            .unwrap_or_else(|_| Err(RemoteError::Timeout(self.settings.remote_timeout)))
    }

    async fn aggregate(&self) {
        if !self.settings.trigger_aggregation {
            return;
        }
        let outcome = timeout(self.settings.remote_timeout, self.sink.trigger_aggregation())
            .await
            .unwrap_or_else(|_| Err(RemoteError::Timeout(self.settings.remote_timeout)));
        if let Err(error) = outcome {
            tracing::warn!("Aggregation trigger failed: {}", error);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::StoredResult;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::{tempdir, TempDir};

    #[derive(Clone, Default)]
    pub struct FakeProbe {
        online: Arc<AtomicBool>,
    }

    impl FakeProbe {
        pub fn new(online: bool) -> Self {
            Self {
                online: Arc::new(AtomicBool::new(online)),
            }
        }

        pub fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }
    }

    impl ConnectivityProbe for FakeProbe {
        async fn is_reachable(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }
    }

    /// Accepts every insert except for the player numbers marked failing
    #[derive(Clone, Default)]
    pub struct FakeSink {
        failing: Arc<Mutex<HashSet<u32>>>,
        inserted: Arc<Mutex<Vec<ResultRecord>>>,
        aggregations: Arc<AtomicUsize>,
        fail_aggregation: Arc<AtomicBool>,
    }

    impl FakeSink {
        pub fn fail_player(&self, player_number: u32) {
            self.failing.lock().unwrap().insert(player_number);
        }

        pub fn recover_player(&self, player_number: u32) {
            self.failing.lock().unwrap().remove(&player_number);
        }

        pub fn inserted(&self) -> Vec<ResultRecord> {
            self.inserted.lock().unwrap().clone()
        }

        pub fn aggregations(&self) -> usize {
            self.aggregations.load(Ordering::SeqCst)
        }
    }

    impl RemoteSink for FakeSink {
        async fn insert(&self, record: &ResultRecord) -> RemoteResult<InsertAck> {
            if self.failing.lock().unwrap().contains(&record.player_number) {
                return Err(RemoteError::Rejected("fake rejection".to_string()));
            }
            self.inserted.lock().unwrap().push(record.clone());
            Ok(InsertAck {
                rows: 1,
                duplicate: false,
            })
        }

        async fn trigger_aggregation(&self) -> RemoteResult<()> {
            self.aggregations.fetch_add(1, Ordering::SeqCst);
            if self.fail_aggregation.load(Ordering::SeqCst) {
                return Err(RemoteError::Api("aggregation unavailable".to_string()));
            }
            Ok(())
        }
    }

    /// Sink whose inserts never complete
    #[derive(Clone, Default)]
    struct HangingSink;

    impl RemoteSink for HangingSink {
        async fn insert(&self, _record: &ResultRecord) -> RemoteResult<InsertAck> {
            std::future::pending().await
        }

        async fn trigger_aggregation(&self) -> RemoteResult<()> {
            Ok(())
        }
    }

    pub fn record(player_number: u32) -> ResultRecord {
        let mut record = ResultRecord::new(
            player_number,
            "Sprint",
            NaiveDate::from_ymd_opt(2024, 5, 18).unwrap(),
        );
        record.position = player_number;
        record.race_time = Some(10.0 + f64::from(player_number));
        record
    }

    pub async fn open_store() -> (TempDir, LocalStore) {
        let tmp = tempdir().unwrap();
        let store = LocalStore::open(tmp.path().join("racelog.db")).await.unwrap();
        (tmp, store)
    }

    fn engine(
        store: &LocalStore,
        probe: &FakeProbe,
        sink: &FakeSink,
    ) -> SyncEngine<FakeProbe, FakeSink> {
        SyncEngine::new(
            store.clone(),
            probe.clone(),
            sink.clone(),
            SyncSettings::default(),
        )
    }

    async fn all_rows(store: &LocalStore) -> Vec<StoredResult> {
        let mut rows = store.list(1_000, 0).await.unwrap();
        rows.reverse();
        rows
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_record_is_stored_unsynced() {
        let (_tmp, store) = open_store().await;
        let (probe, sink) = (FakeProbe::new(false), FakeSink::default());
        let engine = engine(&store, &probe, &sink);

        let produced = record(1);
        let outcome = engine.write_through(&produced).await.unwrap();
        assert_eq!(outcome.state, RecordState::LocalOnly);

        let rows = all_rows(&store).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record, produced);
        assert!(!rows[0].synced);
        assert!(sink.inserted().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn online_record_is_stored_once_as_synced() {
        let (_tmp, store) = open_store().await;
        let (probe, sink) = (FakeProbe::new(true), FakeSink::default());
        let engine = engine(&store, &probe, &sink);

        let outcome = engine.write_through(&record(1)).await.unwrap();
        assert_eq!(outcome.state, RecordState::Synced);

        let rows = all_rows(&store).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, outcome.row_id);
        assert!(rows[0].synced);
        assert_eq!(sink.inserted().len(), 1);
        assert_eq!(sink.aggregations(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remote_rejection_falls_back_to_local_only() {
        let (_tmp, store) = open_store().await;
        let (probe, sink) = (FakeProbe::new(true), FakeSink::default());
        sink.fail_player(3);
        let engine = engine(&store, &probe, &sink);

        let outcome = engine.write_through(&record(3)).await.unwrap();
        assert_eq!(outcome.state, RecordState::LocalOnly);
        assert_eq!(store.unsynced().await.unwrap().len(), 1);
        assert_eq!(sink.aggregations(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn aggregation_failure_keeps_record_synced() {
        let (_tmp, store) = open_store().await;
        let (probe, sink) = (FakeProbe::new(true), FakeSink::default());
        sink.fail_aggregation.store(true, Ordering::SeqCst);
        let engine = engine(&store, &probe, &sink);

        let outcome = engine.write_through(&record(1)).await.unwrap();
        assert_eq!(outcome.state, RecordState::Synced);
        assert!(store.get(outcome.row_id).await.unwrap().unwrap().synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hanging_remote_times_out_to_local_only() {
        let (_tmp, store) = open_store().await;
        let settings = SyncSettings::default().with_remote_timeout(Duration::from_millis(50));
        let engine = SyncEngine::new(store.clone(), FakeProbe::new(true), HangingSink, settings);

        let outcome = engine.write_through(&record(1)).await.unwrap();
        assert_eq!(outcome.state, RecordState::LocalOnly);
        assert_eq!(store.unsynced().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn every_record_lands_exactly_once_under_flapping_connectivity() {
        let (_tmp, store) = open_store().await;
        let (probe, sink) = (FakeProbe::new(true), FakeSink::default());
        sink.fail_player(5);
        let engine = engine(&store, &probe, &sink);

        let produced: Vec<ResultRecord> = (1..=8).map(record).collect();
        for (index, item) in produced.iter().enumerate() {
            probe.set_online(index % 3 != 0);
            engine.write_through(item).await.unwrap();
        }

        let rows = all_rows(&store).await;
        let stored: Vec<ResultRecord> = rows.iter().map(|row| row.record.clone()).collect();
        assert_eq!(stored, produced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sweep_syncs_all_seeded_rows() {
        let (_tmp, store) = open_store().await;
        for player_number in 1..=3 {
            store.append(&record(player_number), false).await.unwrap();
        }
        let (probe, sink) = (FakeProbe::new(true), FakeSink::default());
        let engine = engine(&store, &probe, &sink);

        let report = engine.sweep_once().await;
        assert_eq!(report.attempted, 3);
        assert_eq!(report.synced, 3);
        assert_eq!(report.failed, 0);
        assert!(report.elapsed < engine.settings().sweep_interval);
        assert_eq!(
            report.next_sleep,
            engine.settings().sweep_interval - report.elapsed
        );

        assert!(all_rows(&store).await.iter().all(|row| row.synced));
        assert!(store.unsynced().await.unwrap().is_empty());
        assert_eq!(sink.aggregations(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sweep_isolates_failing_rows() {
        let (_tmp, store) = open_store().await;
        let failing = store.append(&record(1), false).await.unwrap();
        let passing = store.append(&record(2), false).await.unwrap();
        let (probe, sink) = (FakeProbe::new(true), FakeSink::default());
        sink.fail_player(1);
        let engine = engine(&store, &probe, &sink);

        let report = engine.sweep_once().await;
        assert_eq!((report.synced, report.failed), (1, 1));
        assert!(!store.get(failing).await.unwrap().unwrap().synced);
        assert!(store.get(passing).await.unwrap().unwrap().synced);

        // The stuck row keeps failing without blocking rows added later
        let late = store.append(&record(3), false).await.unwrap();
        let report = engine.sweep_once().await;
        assert_eq!((report.attempted, report.synced), (2, 1));
        assert!(store.get(late).await.unwrap().unwrap().synced);
        assert!(!store.get(failing).await.unwrap().unwrap().synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sweep_skips_when_offline() {
        let (_tmp, store) = open_store().await;
        store.append(&record(1), false).await.unwrap();
        let (probe, sink) = (FakeProbe::new(false), FakeSink::default());
        let engine = engine(&store, &probe, &sink);

        let report = engine.sweep_once().await;
        assert!(report.skipped_offline);
        assert_eq!(report.attempted, 0);
        assert!(sink.inserted().is_empty());
        assert_eq!(store.unsynced().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rows_converge_once_connectivity_returns() {
        let (_tmp, store) = open_store().await;
        let (probe, sink) = (FakeProbe::new(false), FakeSink::default());
        let engine = engine(&store, &probe, &sink);

        for player_number in 1..=4 {
            engine.write_through(&record(player_number)).await.unwrap();
        }
        assert_eq!(store.unsynced().await.unwrap().len(), 4);

        probe.set_online(true);
        let report = engine.sweep_once().await;
        assert_eq!(report.synced, 4);
        assert_eq!(store.counts().await.unwrap().unsynced, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn synced_flag_never_reverts_across_paths() {
        let (_tmp, store) = open_store().await;
        let (probe, sink) = (FakeProbe::new(true), FakeSink::default());
        let engine = engine(&store, &probe, &sink);

        let synced = engine.write_through(&record(1)).await.unwrap();
        sink.fail_player(2);
        let pending = engine.write_through(&record(2)).await.unwrap();

        // A sweep with everything failing must leave the synced row alone
        sink.fail_player(1);
        engine.sweep_once().await;
        assert!(store.get(synced.row_id).await.unwrap().unwrap().synced);

        sink.recover_player(2);
        engine.sweep_once().await;
        assert!(store.get(pending.row_id).await.unwrap().unwrap().synced);
        assert!(store.get(synced.row_id).await.unwrap().unwrap().synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sweep_replays_persisted_payload() {
        let (_tmp, store) = open_store().await;
        let original = record(7);
        store.append(&original, false).await.unwrap();
        let (probe, sink) = (FakeProbe::new(true), FakeSink::default());
        let engine = engine(&store, &probe, &sink);

        engine.sweep_once().await;
        assert_eq!(sink.inserted(), vec![original]);
    }

    #[test]
    fn next_sleep_is_period_minus_elapsed() {
        let period = Duration::from_secs(60);
        assert_eq!(
            next_sleep(period, Duration::from_secs(12)),
            Duration::from_secs(48)
        );
        assert_eq!(next_sleep(period, Duration::from_secs(90)), Duration::ZERO);
    }
}
