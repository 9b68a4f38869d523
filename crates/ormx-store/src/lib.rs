//! ormx Store - SQLite collaborator for the persistence core
//!
//! Provides:
//! - Connection open/configure helpers
//! - `SqliteDatabase`, the `Database` implementation sessions run against
//! - Store configuration loading and session bootstrap

pub mod config;
pub mod db;
pub mod errors;
pub mod sqlite;

// Re-export key types
pub use config::{open_session, open_session_with_registry, StoreConfig};
pub use sqlite::SqliteDatabase;
