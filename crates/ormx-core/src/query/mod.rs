//! Query builder and repository
//!
//! Builds flat `SELECT * ... WHERE ... ORDER BY ... LIMIT` statements from
//! validated predicates, runs them through the session's database and
//! hydrates every row into a tracked instance.

pub mod builder;
pub mod repository;

pub use builder::QueryBuilder;
pub use repository::Repository;

use chrono::NaiveDateTime;

use crate::errors::{OrmError, Result};
use crate::model::value::Value;
use crate::model::Handle;

/// Comparison operators accepted by `and_where`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    In,
    NotIn,
}

impl Operator {
    /// Parse one of `<`, `<=`, `=`, `!=`, `>`, `>=`, `IN`, `NOT IN`
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperator` for anything else.
    pub fn parse(operator: &str) -> Result<Self> {
        let parsed = match operator {
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            "=" => Operator::Eq,
            "!=" => Operator::Ne,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            other => {
                return Err(OrmError::InvalidOperator {
                    operator: other.to_string(),
                })
            }
        };
        Ok(parsed)
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }

    pub fn takes_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

/// Sort direction accepted by `order_by`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse `ASC` or `DESC`
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperator` for anything else.
    pub fn parse(direction: &str) -> Result<Self> {
        match direction {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(OrmError::InvalidOperator {
                operator: other.to_string(),
            }),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Right-hand side of a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Scalar(Value),
    List(Vec<Value>),
}

macro_rules! criterion_from {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Criterion {
                fn from(v: $ty) -> Self {
                    Criterion::Scalar(v.into())
                }
            }

            impl From<Vec<$ty>> for Criterion {
                fn from(v: Vec<$ty>) -> Self {
                    Criterion::List(v.into_iter().map(Into::into).collect())
                }
            }
        )+
    };
}

criterion_from!(Value, i64, i32, f64, String, &str, NaiveDateTime);

/// Result of `QueryBuilder::execute`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult<M> {
    /// No row matched
    Empty,
    One(Handle<M>),
    Many(Vec<Handle<M>>),
}

impl<M> QueryResult<M> {
    pub fn is_empty(&self) -> bool {
        matches!(self, QueryResult::Empty)
    }

    pub fn len(&self) -> usize {
        match self {
            QueryResult::Empty => 0,
            QueryResult::One(_) => 1,
            QueryResult::Many(handles) => handles.len(),
        }
    }

    pub fn into_vec(self) -> Vec<Handle<M>> {
        match self {
            QueryResult::Empty => Vec::new(),
            QueryResult::One(handle) => vec![handle],
            QueryResult::Many(handles) => handles,
        }
    }

    pub(crate) fn from_handles(mut handles: Vec<Handle<M>>) -> Self {
        match handles.len() {
            0 => QueryResult::Empty,
            1 => handles
                .pop()
                .map_or(QueryResult::Empty, QueryResult::One),
            _ => QueryResult::Many(handles),
        }
    }
}
