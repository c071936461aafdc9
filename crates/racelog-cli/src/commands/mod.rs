pub mod common;
pub mod delete;
pub mod list;
pub mod listen;
pub mod sessions;
pub mod status;
pub mod sync;
