//! Database access layer for lofi-api
//!
//! One module per table, mirroring the schema created by lofi-common.

pub mod sessions;
pub mod songs;
pub mod tasks;
pub mod users;
