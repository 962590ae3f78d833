//! Database initialization and shared row models

mod init;
mod models;

pub use init::{create_schema, init_database};
pub use models::{AiSong, Task, TaskStatus, User};
