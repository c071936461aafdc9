//! Offline-first replication of race results.
//!
//! Results always land in the [`LocalStore`](crate::services::LocalStore)
//! first. The remote store is updated by an immediate write-through attempt
//! and by a periodic retry sweep.

mod coordinator;
mod engine;
mod probe;
mod remote;

#[cfg(test)]
mod test_server;

pub use coordinator::SyncCoordinator;
pub use engine::{next_sleep, SweepReport, SyncEngine, WriteOutcome};
pub use probe::{ConnectivityProbe, HttpProbe, Offline};
pub use remote::{InsertAck, RemoteError, RemoteResult, RemoteSink, SupabaseSink, Unconfigured};
