//! HTTP API handlers

mod auth;
mod callback;
mod generate;
mod health;
mod songs;
mod status;

pub use auth::{auth_routes, SessionUser};
pub use callback::provider_callback;
pub use generate::generate_song;
pub use health::{health_routes, root_status};
pub use songs::{private_songs, public_songs};
pub use status::get_task_status;
