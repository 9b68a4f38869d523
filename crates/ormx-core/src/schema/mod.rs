//! Schema metadata and descriptors
//!
//! `ModelMetadata` is what a model declares about itself. The registry
//! validates it once per type into a `SchemaDescriptor`, which the batch
//! generator and the query builder consume.

pub mod registry;

pub use registry::SchemaRegistry;

use std::any::TypeId;
use std::fmt;

use chrono::{DateTime, NaiveDateTime};

use crate::errors::{OrmError, Result};
use crate::model::value::{DbValue, Value};
use crate::model::Model;

/// Timestamp wire format used for binding and hydration
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Recognized column kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    DateTime,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    VarChar,
    TinyText,
    Text,
    MediumText,
    LongText,
    Float,
}

impl ColumnKind {
    /// Parse a declared kind, case-insensitively
    pub fn parse(kind: &str) -> Option<Self> {
        let kind = match kind.to_ascii_lowercase().as_str() {
            "datetime" => ColumnKind::DateTime,
            "tinyint" => ColumnKind::TinyInt,
            "smallint" => ColumnKind::SmallInt,
            "int" => ColumnKind::Int,
            "bigint" => ColumnKind::BigInt,
            "varchar" => ColumnKind::VarChar,
            "tinytext" => ColumnKind::TinyText,
            "text" => ColumnKind::Text,
            "mediumtext" => ColumnKind::MediumText,
            "longtext" => ColumnKind::LongText,
            "float" => ColumnKind::Float,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::DateTime => "datetime",
            ColumnKind::TinyInt => "tinyint",
            ColumnKind::SmallInt => "smallint",
            ColumnKind::Int => "int",
            ColumnKind::BigInt => "bigint",
            ColumnKind::VarChar => "varchar",
            ColumnKind::TinyText => "tinytext",
            ColumnKind::Text => "text",
            ColumnKind::MediumText => "mediumtext",
            ColumnKind::LongText => "longtext",
            ColumnKind::Float => "float",
        }
    }

    /// Binding strategy for values of this kind
    pub fn parameter_kind(&self) -> ParameterKind {
        match self {
            ColumnKind::TinyInt | ColumnKind::SmallInt | ColumnKind::Int | ColumnKind::BigInt => {
                ParameterKind::Integer
            }
            ColumnKind::Float => ParameterKind::Float,
            ColumnKind::DateTime => ParameterKind::Timestamp,
            _ => ParameterKind::String,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a column's values are bound as statement parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Integer,
    Float,
    String,
    /// Bound as a formatted string
    Timestamp,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::Integer => "integer",
            ParameterKind::Float => "float",
            ParameterKind::String => "string",
            ParameterKind::Timestamp => "timestamp",
        }
    }

    /// Convert a model value into a statement parameter
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` when the value cannot be bound as this kind.
    pub fn bind(&self, column: &str, value: &Value) -> Result<DbValue> {
        let bound = match (self, value) {
            (_, Value::Null) => DbValue::Null,
            (ParameterKind::Integer, Value::Integer(v)) => DbValue::Integer(*v),
            (ParameterKind::Float, Value::Float(v)) => DbValue::Float(*v),
            (ParameterKind::Float, Value::Integer(v)) => DbValue::Float(*v as f64),
            (ParameterKind::String, Value::Text(v)) => DbValue::Text(v.clone()),
            (ParameterKind::Timestamp, Value::Timestamp(v)) => {
                DbValue::Text(v.format(TIMESTAMP_FORMAT).to_string())
            }
            (ParameterKind::Timestamp, Value::Text(v)) => DbValue::Text(v.clone()),
            (kind, other) => {
                return Err(OrmError::TypeMismatch {
                    column: column.to_string(),
                    expected: kind.as_str().to_string(),
                    found: other.type_name().to_string(),
                })
            }
        };
        Ok(bound)
    }

    /// Convert a raw row cell back into a model value
    ///
    /// Numeric text parses into numeric kinds and numbers render into string
    /// kinds, matching drivers that return every cell as text.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` when the cell cannot be read as this kind.
    pub fn hydrate(&self, column: &str, raw: DbValue) -> Result<Value> {
        let mismatch = |found: String| OrmError::TypeMismatch {
            column: column.to_string(),
            expected: self.as_str().to_string(),
            found,
        };

        let value = match (self, raw) {
            (_, DbValue::Null) => Value::Null,
            (ParameterKind::Integer, DbValue::Integer(v)) => Value::Integer(v),
            (ParameterKind::Integer, DbValue::Text(s)) => Value::Integer(
                s.trim()
                    .parse()
                    .map_err(|_| mismatch(format!("text '{}'", s)))?,
            ),
            (ParameterKind::Float, DbValue::Float(v)) => Value::Float(v),
            (ParameterKind::Float, DbValue::Integer(v)) => Value::Float(v as f64),
            (ParameterKind::Float, DbValue::Text(s)) => Value::Float(
                s.trim()
                    .parse()
                    .map_err(|_| mismatch(format!("text '{}'", s)))?,
            ),
            (ParameterKind::String, DbValue::Text(s)) => Value::Text(s),
            (ParameterKind::String, DbValue::Integer(v)) => Value::Text(v.to_string()),
            (ParameterKind::String, DbValue::Float(v)) => Value::Text(v.to_string()),
            (ParameterKind::Timestamp, DbValue::Text(s)) => {
                Value::Timestamp(parse_timestamp(&s).ok_or_else(|| mismatch(format!("text '{}'", s)))?)
            }
            (_, other) => return Err(mismatch(other.type_name().to_string())),
        };
        Ok(value)
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
}

/// A column as declared by a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: String,
    pub length: Option<u32>,
    pub null: Option<bool>,
}

impl ColumnSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            kind: kind.into(),
            length: None,
            null: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.null = Some(true);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.null = Some(false);
        self
    }
}

/// A many-to-one relation: `field` holds the join key of a `target` row,
/// matched against the target's `join_property`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSpec {
    pub field: String,
    pub target: TypeId,
    pub target_name: &'static str,
    pub join_property: String,
}

impl RelationSpec {
    pub fn many_to_one<T: Model>(field: impl Into<String>, join_property: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            target: TypeId::of::<T>(),
            target_name: std::any::type_name::<T>(),
            join_property: join_property.into(),
        }
    }
}

/// Everything a model declares about its persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    pub table_name: String,
    pub primary_key: String,
    pub allow_schema_update: bool,
    pub columns: Vec<ColumnSpec>,
    pub relations: Vec<RelationSpec>,
}

impl ModelMetadata {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            primary_key: "id".to_string(),
            allow_schema_update: false,
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    pub fn allow_schema_update(mut self, allow: bool) -> Self {
        self.allow_schema_update = allow;
        self
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relation(mut self, relation: RelationSpec) -> Self {
        self.relations.push(relation);
        self
    }
}

/// A validated column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    pub length: Option<u32>,
    pub nullable: Option<bool>,
    pub parameter_kind: ParameterKind,
}

impl ColumnDef {
    /// `kind` or `kind(length)`
    pub fn sql_type(&self) -> String {
        match self.length {
            Some(length) => format!("{}({})", self.kind, length),
            None => self.kind.to_string(),
        }
    }

    /// Column definition fragment, e.g. `post_title varchar(255) NOT NULL`
    pub fn definition(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type());
        match self.nullable {
            Some(true) => sql.push_str(" NULL"),
            Some(false) => sql.push_str(" NOT NULL"),
            None => {}
        }
        sql
    }
}

/// Cached, validated persistence description of one model type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub model: &'static str,
    pub type_id: TypeId,
    pub table: String,
    pub primary_key: String,
    pub allow_schema_update: bool,
    pub columns: Vec<ColumnDef>,
    pub relations: Vec<RelationSpec>,
}

impl SchemaDescriptor {
    /// Validate a model's metadata
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidation` for an empty table name, no columns, an
    /// unrecognized kind, duplicate or primary-key-shadowing column names, or
    /// a relation on an undeclared column.
    pub fn from_model<M: Model>() -> Result<Self> {
        Self::from_metadata(std::any::type_name::<M>(), TypeId::of::<M>(), M::metadata())
    }

    pub(crate) fn from_metadata(
        model: &'static str,
        type_id: TypeId,
        meta: ModelMetadata,
    ) -> Result<Self> {
        let invalid = |reason: String| OrmError::SchemaValidation {
            model: model.to_string(),
            reason,
        };

        if meta.table_name.trim().is_empty() {
            return Err(invalid("table name is missing".to_string()));
        }
        if meta.primary_key.trim().is_empty() {
            return Err(invalid("primary key name is missing".to_string()));
        }
        if meta.columns.is_empty() {
            return Err(invalid("no columns declared".to_string()));
        }

        let mut columns: Vec<ColumnDef> = Vec::with_capacity(meta.columns.len());
        for spec in meta.columns {
            let kind = ColumnKind::parse(&spec.kind).ok_or_else(|| {
                invalid(format!("unknown column kind {} on {}", spec.kind, spec.name))
            })?;
            if spec.name == meta.primary_key {
                return Err(invalid(format!(
                    "column {} shadows the primary key",
                    spec.name
                )));
            }
            if columns.iter().any(|c| c.name == spec.name) {
                return Err(invalid(format!("duplicate column {}", spec.name)));
            }
            columns.push(ColumnDef {
                name: spec.name,
                kind,
                length: spec.length,
                nullable: spec.null,
                parameter_kind: kind.parameter_kind(),
            });
        }

        for relation in &meta.relations {
            if !columns.iter().any(|c| c.name == relation.field) {
                return Err(invalid(format!(
                    "relation field {} is not a declared column",
                    relation.field
                )));
            }
        }

        Ok(Self {
            model,
            type_id,
            table: meta.table_name,
            primary_key: meta.primary_key,
            allow_schema_update: meta.allow_schema_update,
            columns,
            relations: meta.relations,
        })
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// True for declared columns and the primary key
    pub fn has_property(&self, name: &str) -> bool {
        name == self.primary_key || self.column(name).is_some()
    }

    /// Parameter kind of a column or of the primary key
    pub fn parameter_kind_of(&self, name: &str) -> Option<ParameterKind> {
        if name == self.primary_key {
            return Some(ParameterKind::Integer);
        }
        self.column(name).map(|c| c.parameter_kind)
    }

    pub fn relation(&self, field: &str) -> Option<&RelationSpec> {
        self.relations.iter().find(|r| r.field == field)
    }
}
