//! Store configuration and session bootstrap
//!
//! ```toml
//! database_path = "data/blog.db"
//! wal = true
//! log_profile = "development"
//!
//! [session]
//! table_prefix = "wp_"
//! log_parameters = false
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use ormx_core::errors::OrmError;
use ormx_core::logging_facility::{self, Profile};
use ormx_core::{SchemaRegistry, Session, SessionConfig};

use crate::db;
use crate::errors::{io_error, Result};
use crate::sqlite::SqliteDatabase;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file; `None` opens a private in-memory database
    pub database_path: Option<PathBuf>,
    /// Switch file databases to WAL journaling
    pub wal: bool,
    /// Install the process-wide logging subscriber on first session open
    pub log_profile: Option<Profile>,
    pub session: SessionConfig,
}

impl StoreConfig {
    /// Parse from a TOML document
    ///
    /// # Errors
    ///
    /// Returns `Config` if the document is not valid TOML for this shape.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| OrmError::Config {
            message: e.to_string(),
        })
    }

    /// Read and parse a TOML file
    ///
    /// A relative `database_path` is resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        let mut config = Self::from_toml_str(&text)?;

        if let (Some(db_path), Some(dir)) = (&config.database_path, path.parent()) {
            if db_path.is_relative() {
                config.database_path = Some(dir.join(db_path));
            }
        }
        Ok(config)
    }
}

/// Open a session with its own schema registry
///
/// # Errors
///
/// Returns `Database` if the connection cannot be opened or configured.
pub fn open_session(config: &StoreConfig) -> Result<Session<SqliteDatabase>> {
    open_session_with_registry(config, Arc::new(SchemaRegistry::new()))
}

/// Open a session sharing an existing schema registry
///
/// # Errors
///
/// Returns `Database` if the connection cannot be opened or configured.
pub fn open_session_with_registry(
    config: &StoreConfig,
    registry: Arc<SchemaRegistry>,
) -> Result<Session<SqliteDatabase>> {
    if let Some(profile) = config.log_profile {
        logging_facility::init(profile);
    }

    let conn = match &config.database_path {
        Some(path) => db::open(path)?,
        None => db::open_in_memory()?,
    };
    db::configure(&conn, config.wal)?;

    let session = Session::with_registry(
        SqliteDatabase::new(conn),
        registry,
        config.session.clone(),
    );
    tracing::debug!(
        session_id = %session.id(),
        database = ?config.database_path,
        table_prefix = %config.session.table_prefix,
        "session opened"
    );
    Ok(session)
}
