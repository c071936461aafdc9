//! Sync coordinator: the write-through entry point plus the background sweep.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::SyncSettings;
use crate::error::Result;
use crate::models::ResultRecord;
use crate::services::LocalStore;

use super::engine::{SweepReport, SyncEngine, WriteOutcome};
use super::probe::ConnectivityProbe;
use super::remote::RemoteSink;

/// Owns the sync engine and its background retry worker.
///
/// The worker starts with the coordinator and runs until [`shutdown`] is
/// called or the coordinator is dropped. It checks the stop signal between
/// cycles and while waiting on the connectivity probe; an in-flight insert
/// is always allowed to finish so its acknowledgement is recorded.
///
/// [`shutdown`]: SyncCoordinator::shutdown
pub struct SyncCoordinator<P, R> {
    engine: Arc<SyncEngine<P, R>>,
    stop_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl<P: ConnectivityProbe, R: RemoteSink> SyncCoordinator<P, R> {
    /// Build the engine and spawn the sweep worker on the current runtime.
    pub fn start(store: LocalStore, probe: P, sink: R, settings: SyncSettings) -> Self {
        let engine = Arc::new(SyncEngine::new(store, probe, sink, settings));
        let (stop_tx, stop_rx) = watch::channel(false);

        tracing::info!(
            "Starting result sync worker (every {:?})",
            engine.settings().sweep_interval
        );
        let worker = tokio::spawn(run_sweeps(Arc::clone(&engine), stop_rx));

        Self {
            engine,
            stop_tx,
            worker,
        }
    }

    /// Hand a finished result to the sync pipeline.
    ///
    /// Returns once the result is in the local store. Fails only when the
    /// local store cannot be written.
    pub async fn record_result(&self, record: &ResultRecord) -> Result<WriteOutcome> {
        self.engine.write_through(record).await
    }

    /// Run one sweep cycle now, outside the regular schedule.
    pub async fn sweep_now(&self) -> SweepReport {
        self.engine.sweep_once().await
    }

    /// Passive connectivity indicator.
    pub async fn is_online(&self) -> bool {
        self.engine.is_online().await
    }

    pub fn store(&self) -> &LocalStore {
        self.engine.store()
    }

    /// Stop the sweep worker and wait for it to exit.
    pub async fn shutdown(self) {
        self.stop_tx.send_replace(true);
        if let Err(error) = self.worker.await {
            tracing::error!("Sync worker ended abnormally: {}", error);
        }
        tracing::info!("Result sync worker stopped");
    }
}

async fn run_sweeps<P: ConnectivityProbe, R: RemoteSink>(
    engine: Arc<SyncEngine<P, R>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        if *stop_rx.borrow() {
            break;
        }

        let started = Instant::now();
        let online = tokio::select! {
            _ = stop_rx.changed() => break,
            online = engine.is_online() => online,
        };

        let report = if online {
            engine.sweep_unsynced(started).await
        } else {
            engine.skipped(started)
        };

        // A closed channel means the coordinator is gone
        tokio::select! {
            _ = stop_rx.changed() => break,
            () = tokio::time::sleep(report.next_sleep) => {}
        }
    }
}
