//! Shared foundation for the lofi backend: error type, configuration
//! resolution, and database initialization/models.

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
