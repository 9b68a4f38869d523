//! Session configuration

use serde::{Deserialize, Serialize};

use crate::errors::{OrmError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Prepended to every table name rendered into SQL
    pub table_prefix: String,
    /// Include bound parameter values in trace logs
    pub log_parameters: bool,
}

impl SessionConfig {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            table_prefix: prefix.into(),
            ..Self::default()
        }
    }

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

    /// Table name as it appears in SQL
    pub fn table_name(&self, table: &str) -> String {
        format!("{}{}", self.table_prefix, table)
    }
}
