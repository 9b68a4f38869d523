//! Error helpers for ormx-store
//!
//! Maps driver and IO failures onto the core `OrmError` taxonomy

use ormx_core::errors::OrmError;

pub use ormx_core::errors::Result;

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(op: &str, err: rusqlite::Error) -> OrmError {
    OrmError::database(op, err.to_string())
}

/// Create a configuration error from an IO failure
pub fn io_error(path: &std::path::Path, err: std::io::Error) -> OrmError {
    OrmError::Config {
        message: format!("cannot read {}: {}", path.display(), err),
    }
}
