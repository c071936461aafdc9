//! Data models for racelog

mod result;
mod session;

pub use result::{RecordKey, RecordState, ResultRecord, StoredResult, SyncCounts};
pub use session::{NewSession, SessionInfo};
