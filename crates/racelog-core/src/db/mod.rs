//! Database layer for racelog

mod connection;
mod migrations;
mod result_repository;
mod session_repository;

pub use connection::Database;
pub use result_repository::{LibSqlResultRepository, ResultRepository};
pub use session_repository::{LibSqlSessionRepository, SessionRepository};
