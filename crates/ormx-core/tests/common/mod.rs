//! Shared fixtures: models and a recording database double

#![allow(dead_code)]

use ormx_core::database::{Database, Row};
use ormx_core::errors::{OrmError, Result};
use ormx_core::{impl_model, ColumnSpec, DbValue, Dialect, Reference, RelationSpec};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Widget {
    pub id: Option<i64>,
    pub name: String,
    pub price: f64,
}

impl_model! {
    Widget {
        table: "widget",
        primary_key: id,
        columns: {
            name => ColumnSpec::new("varchar").length(255).not_null(),
            price => ColumnSpec::new("float"),
        }
    }
}

pub fn widget(name: &str, price: f64) -> Widget {
    Widget {
        id: None,
        name: name.to_string(),
        price,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gadget {
    pub id: Option<i64>,
    pub label: String,
    pub stock: i64,
}

impl_model! {
    Gadget {
        table: "gadget",
        primary_key: id,
        columns: {
            label => ColumnSpec::new("varchar").length(64),
            stock => ColumnSpec::new("int"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Users {
    pub id: Option<i64>,
    pub user_login: String,
    pub display_name: String,
}

impl_model! {
    Users {
        table: "users",
        primary_key: id,
        columns: {
            user_login => ColumnSpec::new("varchar").length(60).not_null(),
            display_name => ColumnSpec::new("varchar").length(250).not_null(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Posts {
    pub id: Option<i64>,
    pub post_author: Option<i64>,
    pub post_title: String,
    pub author: Reference<Users>,
}

impl_model! {
    Posts {
        table: "posts",
        primary_key: id,
        columns: {
            post_author => ColumnSpec::new("bigint").length(20),
            post_title => ColumnSpec::new("text"),
        },
        allow_schema_update: true,
        relations: [RelationSpec::many_to_one::<Users>("post_author", "id")]
    }
}

pub fn author_slot(post: &mut Posts) -> &mut Reference<Users> {
    &mut post.author
}

/// Records every statement; can be told to fail or report zero rows
#[derive(Debug)]
pub struct RecordingDatabase {
    pub dialect: Dialect,
    pub batch_ids: bool,
    pub executed: Vec<(String, Vec<DbValue>)>,
    pub queries: Vec<(String, Vec<DbValue>)>,
    /// (sql fragment, rows) answered to the first SELECT containing it
    pub responses: Vec<(String, Vec<Row>)>,
    pub fail_on: Option<String>,
    pub zero_on: Option<String>,
    /// Claim batch id support but never report the ids
    pub withhold_ids: bool,
    next_id: i64,
}

impl Default for RecordingDatabase {
    fn default() -> Self {
        Self::new(Dialect::MySql)
    }
}

impl RecordingDatabase {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            batch_ids: false,
            executed: Vec::new(),
            queries: Vec::new(),
            responses: Vec::new(),
            fail_on: None,
            zero_on: None,
            withhold_ids: false,
            next_id: 0,
        }
    }

    pub fn with_batch_ids(mut self) -> Self {
        self.batch_ids = true;
        self
    }

    pub fn respond(mut self, fragment: &str, rows: Vec<Row>) -> Self {
        self.responses.push((fragment.to_string(), rows));
        self
    }

    pub fn sql(&self) -> Vec<&str> {
        self.executed.iter().map(|(sql, _)| sql.as_str()).collect()
    }
}

fn rows_in(sql: &str, params: &[DbValue]) -> usize {
    if sql.starts_with("DELETE") {
        params.len()
    } else {
        sql.matches("), (").count() + 1
    }
}

impl Database for RecordingDatabase {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64> {
        self.executed.push((sql.to_string(), params.to_vec()));
        if let Some(fragment) = &self.fail_on {
            if sql.contains(fragment.as_str()) {
                return Err(OrmError::database("execute", "simulated driver failure"));
            }
        }
        if let Some(fragment) = &self.zero_on {
            if sql.contains(fragment.as_str()) {
                return Ok(0);
            }
        }
        let rows = rows_in(sql, params);
        if sql.starts_with("INSERT") && !sql.contains(" UPDATE ") {
            self.next_id += rows as i64;
        }
        Ok(rows as u64)
    }

    fn query(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<Row>> {
        self.queries.push((sql.to_string(), params.to_vec()));
        Ok(self
            .responses
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    fn last_insert_id(&self) -> Option<i64> {
        (self.next_id > 0).then_some(self.next_id)
    }

    fn reports_batch_ids(&self) -> bool {
        self.batch_ids
    }

    fn generated_ids(&self, rows: usize) -> Option<Vec<i64>> {
        if !self.batch_ids || self.withhold_ids {
            return None;
        }
        let first = self.next_id - rows as i64 + 1;
        Some((first..=self.next_id).collect())
    }
}

/// Build a result row from `(column, value)` pairs
pub fn row(cells: &[(&str, DbValue)]) -> Row {
    cells
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}
