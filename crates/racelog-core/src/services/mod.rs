//! Shared services used by the coordinator and the CLI.

mod local_store;

pub use local_store::LocalStore;
