//! SQLite snapshot store.

pub mod config;
pub mod constants;
pub mod errors;
pub mod sqlite;
