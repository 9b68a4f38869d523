//! SQLite implementation of the core `Database` seam

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};

use ormx_core::database::{Database, Row};
use ormx_core::{DbValue, Dialect};

use crate::db;
use crate::errors::{from_rusqlite, Result};

/// A session's connection to one SQLite database
///
/// Rowids generated by a single multi-row INSERT are consecutive and end at
/// `last_insert_rowid()`, so batch ids are reported.
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Fresh in-memory database with foreign keys enabled
    ///
    /// # Errors
    ///
    /// Returns `Database` if SQLite cannot open or configure the connection.
    pub fn open_in_memory() -> Result<Self> {
        let conn = db::open_in_memory()?;
        db::configure(&conn, false)?;
        Ok(Self::new(conn))
    }

    /// The underlying connection, for DDL and ad-hoc inspection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("path", &self.conn.path())
            .finish()
    }
}

fn to_sql(value: &DbValue) -> SqlValue {
    match value {
        DbValue::Null => SqlValue::Null,
        DbValue::Integer(i) => SqlValue::Integer(*i),
        DbValue::Float(f) => SqlValue::Real(*f),
        DbValue::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn from_sql(cell: ValueRef<'_>) -> DbValue {
    match cell {
        ValueRef::Null => DbValue::Null,
        ValueRef::Integer(i) => DbValue::Integer(i),
        ValueRef::Real(f) => DbValue::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            DbValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl Database for SqliteDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64> {
        tracing::trace!(sql = %sql, param_count = params.len(), "sqlite execute");
        let affected = self
            .conn
            .execute(sql, params_from_iter(params.iter().map(to_sql)))
            .map_err(|e| from_rusqlite("execute", e))?;
        Ok(affected as u64)
    }

    fn query(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<Row>> {
        tracing::trace!(sql = %sql, param_count = params.len(), "sqlite query");
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| from_rusqlite("query", e))?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = stmt
            .query(params_from_iter(params.iter().map(to_sql)))
            .map_err(|e| from_rusqlite("query", e))?;

        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(|e| from_rusqlite("query", e))? {
            let mut record = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                let cell = row.get_ref(idx).map_err(|e| from_rusqlite("query", e))?;
                record.insert(name.clone(), from_sql(cell));
            }
            result.push(record);
        }
        Ok(result)
    }

    fn last_insert_id(&self) -> Option<i64> {
        match self.conn.last_insert_rowid() {
            0 => None,
            id => Some(id),
        }
    }

    fn reports_batch_ids(&self) -> bool {
        true
    }

    fn generated_ids(&self, rows: usize) -> Option<Vec<i64>> {
        let last = self.last_insert_id()?;
        let first = last.checked_sub(i64::try_from(rows).ok()?)? + 1;
        if rows == 0 || first < 1 {
            return None;
        }
        Some((first..=last).collect())
    }
}
