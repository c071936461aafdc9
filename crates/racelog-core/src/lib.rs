//! racelog-core - Core library for racelog
//!
//! This crate contains the result models and the local result store. It also
//! decodes timing device output and runs the sync coordinator that replicates
//! race results to the remote backend.

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{RecordKey, RecordState, ResultRecord, SessionInfo, StoredResult};
