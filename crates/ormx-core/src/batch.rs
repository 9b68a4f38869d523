//! Batch SQL generation for the flush phases
//!
//! Groups classified tracking entries by table and renders one parameterized
//! statement per table: a multi-row INSERT, a multi-row upsert, or a
//! `DELETE ... WHERE pk IN (...)`. Pure: nothing here touches the database
//! or the tracking store.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::dialect::{placeholders, Dialect};
use crate::errors::{OrmError, Result};
use crate::model::value::DbValue;
use crate::model::{Entity, Identity};
use crate::schema::{ParameterKind, SchemaDescriptor};
use crate::tracking::TrackingEntry;

/// One step of a flush, run in `Phase::ORDER`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Update,
    Insert,
    Delete,
}

impl Phase {
    pub const ORDER: [Phase; 3] = [Phase::Update, Phase::Insert, Phase::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Update => "UPDATE",
            Phase::Insert => "INSERT",
            Phase::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendered SQL with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<DbValue>,
}

/// Pending writes for one table in one phase
#[derive(Debug, Clone)]
pub struct TableBatch {
    pub table: String,
    pub schema: Arc<SchemaDescriptor>,
    /// Columns each row supplies, in order (the primary key leads in UPDATE
    /// and is the only column in DELETE)
    pub columns: Vec<String>,
    /// Instances contributing rows, in row order
    pub members: Vec<Identity>,
    /// Row values flattened, `columns.len()` per member
    pub values: Vec<DbValue>,
}

impl TableBatch {
    fn new(schema: &Arc<SchemaDescriptor>, phase: Phase) -> Self {
        let columns = match phase {
            Phase::Update => std::iter::once(schema.primary_key.clone())
                .chain(schema.columns.iter().map(|c| c.name.clone()))
                .collect(),
            Phase::Insert => schema.columns.iter().map(|c| c.name.clone()).collect(),
            Phase::Delete => vec![schema.primary_key.clone()],
        };
        Self {
            table: schema.table.clone(),
            schema: Arc::clone(schema),
            columns,
            members: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.members.len()
    }

    /// Render the statement for this batch
    ///
    /// `prefix` is prepended to the table name.
    pub fn render(&self, phase: Phase, dialect: Dialect, prefix: &str) -> Statement {
        let table = format!("{}{}", prefix, self.table);
        let sql = match phase {
            Phase::Insert | Phase::Update => {
                let group = format!("({})", placeholders(self.columns.len()));
                let groups = vec![group; self.row_count()].join(", ");
                let insert = format!(
                    "INSERT INTO {} ({}) VALUES {}",
                    table,
                    self.columns.join(", "),
                    groups
                );
                if phase == Phase::Update {
                    let assigned = &self.columns[1..];
                    format!(
                        "{} {}",
                        insert,
                        dialect.upsert_clause(&self.schema.primary_key, assigned)
                    )
                } else {
                    insert
                }
            }
            Phase::Delete => format!(
                "DELETE FROM {} WHERE {} IN ({})",
                table,
                self.schema.primary_key,
                placeholders(self.row_count())
            ),
        };
        Statement {
            sql,
            params: self.values.clone(),
        }
    }

    /// Split into one single-row batch per member, in row order
    pub fn single_rows(&self) -> Vec<TableBatch> {
        let width = self.columns.len();
        self.members
            .iter()
            .zip(self.values.chunks(width.max(1)))
            .map(|(identity, row)| TableBatch {
                table: self.table.clone(),
                schema: Arc::clone(&self.schema),
                columns: self.columns.clone(),
                members: vec![*identity],
                values: row.to_vec(),
            })
            .collect()
    }
}

fn missing(schema: &SchemaDescriptor, column: &str) -> OrmError {
    OrmError::MissingField {
        table: schema.table.clone(),
        column: column.to_string(),
    }
}

fn row_values(entity: &dyn Entity, schema: &SchemaDescriptor, out: &mut Vec<DbValue>) -> Result<()> {
    for column in &schema.columns {
        let value = entity
            .column_value(&column.name)
            .map_err(|_| missing(schema, &column.name))?;
        out.push(column.parameter_kind.bind(&column.name, &value)?);
    }
    Ok(())
}

fn push_entry(batch: &mut TableBatch, entry: &TrackingEntry, phase: Phase) -> Result<()> {
    let schema = Arc::clone(entry.schema());
    let pk = schema.primary_key.as_str();
    match phase {
        Phase::Update => {
            let entity = entry.current().ok_or_else(|| missing(&schema, pk))?;
            let key = entity.key().ok_or_else(|| missing(&schema, pk))?;
            batch.values.push(DbValue::Integer(key));
            row_values(entity, &schema, &mut batch.values)?;
        }
        Phase::Insert => {
            let entity = entry.current().ok_or_else(|| missing(&schema, pk))?;
            row_values(entity, &schema, &mut batch.values)?;
        }
        Phase::Delete => {
            let key = entry
                .snapshot()
                .and_then(|s| s.primary_key)
                .ok_or_else(|| missing(&schema, pk))?;
            batch
                .values
                .push(ParameterKind::Integer.bind(pk, &key.into())?);
        }
    }
    batch.members.push(entry.identity());
    Ok(())
}

/// Group entries by table and collect their rows for `phase`
///
/// Every entry yields exactly one row. A row that cannot supply a declared
/// column fails the whole collection with `MissingField`.
///
/// # Errors
///
/// Returns `MissingField` for an unreadable column or absent primary key,
/// `TypeMismatch` for a value that cannot be bound as its column's kind.
pub fn collect<'a, I>(entries: I, phase: Phase) -> Result<BTreeMap<String, TableBatch>>
where
    I: IntoIterator<Item = &'a TrackingEntry>,
{
    let mut batches: BTreeMap<String, TableBatch> = BTreeMap::new();
    for entry in entries {
        let schema = entry.schema();
        let batch = batches
            .entry(schema.table.clone())
            .or_insert_with(|| TableBatch::new(schema, phase));
        push_entry(batch, entry, phase)?;
    }
    Ok(batches)
}
