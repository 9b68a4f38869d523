//! Database collaborator seam
//!
//! The core never talks to a driver directly. Implementations execute SQL
//! with positional `?` parameters and return affected-row counts or rows.

use std::collections::BTreeMap;

use crate::dialect::Dialect;
use crate::errors::Result;
use crate::model::value::DbValue;

/// One result row: column name to raw cell
pub type Row = BTreeMap<String, DbValue>;

pub trait Database {
    /// Dialect used to render upserts for this driver
    fn dialect(&self) -> Dialect;

    /// Run a write statement and return the number of affected rows
    ///
    /// # Errors
    ///
    /// Returns `Database` on any driver-level failure.
    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64>;

    /// Run a SELECT and return its rows in order
    ///
    /// # Errors
    ///
    /// Returns `Database` on any driver-level failure.
    fn query(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<Row>>;

    /// Id generated by the most recent single-row INSERT
    fn last_insert_id(&self) -> Option<i64>;

    /// Whether `generated_ids` can report every id of a multi-row INSERT
    fn reports_batch_ids(&self) -> bool {
        false
    }

    /// Ids generated by the most recent INSERT of `rows` rows, in row order
    fn generated_ids(&self, _rows: usize) -> Option<Vec<i64>> {
        None
    }
}

impl<D: Database + ?Sized> Database for Box<D> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn last_insert_id(&self) -> Option<i64> {
        (**self).last_insert_id()
    }

    fn reports_batch_ids(&self) -> bool {
        (**self).reports_batch_ids()
    }

    fn generated_ids(&self, rows: usize) -> Option<Vec<i64>> {
        (**self).generated_ids(rows)
    }
}
