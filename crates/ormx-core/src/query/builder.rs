//! Query builder
//!
//! Predicates are validated and bound when they are added, so a failed call
//! never leaves half a predicate behind. `build()` renders the statement;
//! any later mutation discards it again.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use crate::batch::Statement;
use crate::database::{Database, Row};
use crate::dialect::placeholders;
use crate::errors::{OrmError, Result};
use crate::model::value::DbValue;
use crate::model::{Handle, Model};
use crate::query::{Criterion, Operator, QueryResult, SortDirection};
use crate::schema::SchemaDescriptor;
use crate::session::Session;
use crate::{log_op_end, log_op_error, log_op_start};

#[derive(Debug, Clone, PartialEq)]
struct Predicate {
    property: String,
    operator: Operator,
    params: Vec<DbValue>,
}

impl Predicate {
    fn render(&self) -> String {
        if self.operator.takes_list() {
            if self.params.is_empty() {
                // Only IN survives with an empty list; it matches nothing.
                return "1 = 0".to_string();
            }
            format!(
                "{} {} ({})",
                self.property,
                self.operator.as_sql(),
                placeholders(self.params.len())
            )
        } else {
            format!("{} {} ?", self.property, self.operator.as_sql())
        }
    }
}

pub struct QueryBuilder<'s, M: Model, D: Database> {
    session: &'s mut Session<D>,
    schema: Arc<SchemaDescriptor>,
    predicates: Vec<Predicate>,
    order: Vec<(String, SortDirection)>,
    limit: Option<(i64, i64)>,
    built: Option<Statement>,
    _model: PhantomData<fn() -> M>,
}

impl<'s, M: Model, D: Database> QueryBuilder<'s, M, D> {
    pub(crate) fn new(session: &'s mut Session<D>) -> Result<Self> {
        let schema = session.schema::<M>()?;
        Ok(Self {
            session,
            schema,
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            built: None,
            _model: PhantomData,
        })
    }

    fn check_property(&self, property: &str) -> Result<()> {
        if self.schema.has_property(property) {
            Ok(())
        } else {
            Err(OrmError::UnknownProperty {
                property: property.to_string(),
                model: self.schema.model.to_string(),
            })
        }
    }

    /// Add `property operator value` to the WHERE clause (ANDed)
    ///
    /// `IN` / `NOT IN` take a list; the other operators take a scalar. A
    /// value of the wrong shape drops the predicate without error, as does
    /// `NOT IN` with an empty list.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty`, `InvalidOperator`, or `TypeMismatch` when a
    /// value cannot be bound as the column's kind. The builder is unchanged
    /// on error.
    pub fn and_where(
        &mut self,
        property: &str,
        value: impl Into<Criterion>,
        operator: &str,
    ) -> Result<&mut Self> {
        self.check_property(property)?;
        let operator = Operator::parse(operator)?;
        let kind = self
            .schema
            .parameter_kind_of(property)
            .ok_or_else(|| OrmError::UnknownProperty {
                property: property.to_string(),
                model: self.schema.model.to_string(),
            })?;

        let params = match (value.into(), operator.takes_list()) {
            (Criterion::Scalar(value), false) => vec![kind.bind(property, &value)?],
            (Criterion::List(values), true) => {
                if values.is_empty() && operator == Operator::NotIn {
                    return Ok(self);
                }
                values
                    .iter()
                    .map(|v| kind.bind(property, v))
                    .collect::<Result<Vec<_>>>()?
            }
            _ => {
                tracing::debug!(
                    property = %property,
                    operator = operator.as_sql(),
                    "predicate value has the wrong shape; dropped"
                );
                return Ok(self);
            }
        };

        self.predicates.push(Predicate {
            property: property.to_string(),
            operator,
            params,
        });
        self.built = None;
        Ok(self)
    }

    /// Append a sort key
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` or `InvalidOperator` (for a direction other
    /// than `ASC` / `DESC`).
    pub fn order_by(&mut self, property: &str, direction: &str) -> Result<&mut Self> {
        self.check_property(property)?;
        let direction = SortDirection::parse(direction)?;
        self.order.push((property.to_string(), direction));
        self.built = None;
        Ok(self)
    }

    /// Limit the result to `count` rows starting at `offset`
    ///
    /// Ignored unless `count > 0` and `offset >= 0`.
    pub fn limit(&mut self, count: i64, offset: i64) -> &mut Self {
        if count > 0 && offset >= 0 {
            self.limit = Some((count, offset));
            self.built = None;
        }
        self
    }

    /// Render the SELECT statement
    pub fn build(&mut self) -> &mut Self {
        let table = self.session.config.table_name(&self.schema.table);
        let mut sql = format!("SELECT * FROM {}", table);
        let mut params = Vec::new();

        if !self.predicates.is_empty() {
            let clauses: Vec<String> = self.predicates.iter().map(Predicate::render).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
            for predicate in &self.predicates {
                params.extend(predicate.params.iter().cloned());
            }
        }

        if !self.order.is_empty() {
            let keys: Vec<String> = self
                .order
                .iter()
                .map(|(property, direction)| format!("{} {}", property, direction.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }

        if let Some((count, offset)) = self.limit {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(DbValue::Integer(count));
            params.push(DbValue::Integer(offset));
        }

        self.built = Some(Statement { sql, params });
        self
    }

    /// The rendered statement, if `build()` ran since the last mutation
    pub fn statement(&self) -> Option<&Statement> {
        self.built.as_ref()
    }

    /// Run the built query, tracking every hydrated row
    ///
    /// # Errors
    ///
    /// Returns `QueryNotBuilt` before `build()`, `Database` on driver errors,
    /// and `MissingField` / `TypeMismatch` if any row cannot be hydrated. On
    /// error nothing from the result set is tracked.
    pub fn execute(&mut self) -> Result<QueryResult<M>> {
        self.execute_all().map(QueryResult::from_handles)
    }

    /// Like `execute`, always returning a list
    ///
    /// # Errors
    ///
    /// Same as `execute`.
    pub fn execute_all(&mut self) -> Result<Vec<Handle<M>>> {
        let statement = self.built.clone().ok_or(OrmError::QueryNotBuilt)?;
        let start = Instant::now();
        log_op_start!("query", session_id = %self.session.id, table = %self.schema.table);

        let result = self.run(&statement);
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(handles) => {
                log_op_end!(
                    "query",
                    duration_ms = duration_ms,
                    session_id = %self.session.id,
                    table = %self.schema.table,
                    row_count = handles.len()
                );
            }
            Err(err) => {
                log_op_error!(
                    "query",
                    err.clone(),
                    duration_ms = duration_ms,
                    session_id = %self.session.id,
                    table = %self.schema.table
                );
            }
        }
        result
    }

    fn run(&mut self, statement: &Statement) -> Result<Vec<Handle<M>>> {
        if self.session.config.log_parameters {
            tracing::trace!(sql = %statement.sql, params = ?statement.params, "select");
        }
        let rows = self.session.db.query(&statement.sql, &statement.params)?;

        let instances = rows
            .into_iter()
            .map(|row| hydrate::<M>(&self.schema, row))
            .collect::<Result<Vec<M>>>()?;

        instances
            .into_iter()
            .map(|instance| self.session.track(instance))
            .collect()
    }
}

/// Build an instance from one result row
///
/// # Errors
///
/// Returns `MissingField` if the row lacks a declared column or the primary
/// key, `TypeMismatch` if a cell cannot be read as its column's kind.
pub fn hydrate<M: Model>(schema: &SchemaDescriptor, mut row: Row) -> Result<M> {
    let missing = |column: &str| OrmError::MissingField {
        table: schema.table.clone(),
        column: column.to_string(),
    };

    let mut instance = M::default();

    let raw_key = row
        .remove(&schema.primary_key)
        .ok_or_else(|| missing(&schema.primary_key))?;
    let key = crate::schema::ParameterKind::Integer.hydrate(&schema.primary_key, raw_key)?;
    instance.set_field(&schema.primary_key, key)?;

    for column in &schema.columns {
        let raw = row.remove(&column.name).ok_or_else(|| missing(&column.name))?;
        let value = column.parameter_kind.hydrate(&column.name, raw)?;
        instance.set_field(&column.name, value)?;
    }
    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::model::value::Value;
    use crate::schema::ColumnSpec;

    #[derive(Debug, Clone, Default)]
    struct Post {
        id: Option<i64>,
        title: String,
        views: i64,
    }

    crate::impl_model! {
        Post {
            table: "posts",
            primary_key: id,
            columns: {
                title => ColumnSpec::new("varchar").length(255),
                views => ColumnSpec::new("bigint"),
            }
        }
    }

    /// Returns canned rows and remembers the last SELECT
    #[derive(Default)]
    struct Canned {
        rows: Vec<Row>,
        last_sql: Option<String>,
    }

    impl Database for Canned {
        fn dialect(&self) -> Dialect {
            Dialect::MySql
        }

        fn execute(&mut self, _sql: &str, _params: &[DbValue]) -> Result<u64> {
            Ok(1)
        }

        fn query(&mut self, sql: &str, _params: &[DbValue]) -> Result<Vec<Row>> {
            self.last_sql = Some(sql.to_string());
            Ok(self.rows.clone())
        }

        fn last_insert_id(&self) -> Option<i64> {
            None
        }
    }

    fn row(id: i64, title: &str, views: i64) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), DbValue::Integer(id));
        row.insert("title".to_string(), DbValue::Text(title.to_string()));
        row.insert("views".to_string(), DbValue::Integer(views));
        row
    }

    #[test]
    fn test_build_renders_where_order_limit() {
        let mut session = Session::new(Canned::default());
        let mut qb = session.create_query_builder::<Post>().unwrap();
        qb.and_where("title", "a", "=")
            .unwrap()
            .and_where("views", vec![1_i64, 2], "IN")
            .unwrap()
            .order_by("title", "ASC")
            .unwrap()
            .limit(10, 5)
            .build();

        let statement = qb.statement().unwrap();
        assert_eq!(
            statement.sql,
            "SELECT * FROM posts WHERE title = ? AND views IN (?, ?) ORDER BY title ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            statement.params,
            vec![
                DbValue::Text("a".to_string()),
                DbValue::Integer(1),
                DbValue::Integer(2),
                DbValue::Integer(10),
                DbValue::Integer(5),
            ]
        );
    }

    #[test]
    fn test_invalid_calls_leave_builder_untouched() {
        let mut session = Session::new(Canned::default());
        let mut qb = session.create_query_builder::<Post>().unwrap();
        qb.build();

        assert!(matches!(
            qb.and_where("nonexistent", 1_i64, "="),
            Err(OrmError::UnknownProperty { .. })
        ));
        assert!(matches!(
            qb.and_where("id", 1_i64, "LIKE"),
            Err(OrmError::InvalidOperator { .. })
        ));
        assert!(matches!(
            qb.order_by("title", "UP"),
            Err(OrmError::InvalidOperator { .. })
        ));
        assert_eq!(qb.statement().unwrap().sql, "SELECT * FROM posts");
    }

    #[test]
    fn test_shape_mismatch_and_empty_lists() {
        let mut session = Session::new(Canned::default());
        let mut qb = session.create_query_builder::<Post>().unwrap();
        qb.and_where("views", 3_i64, "IN")
            .unwrap()
            .and_where("views", vec![1_i64], "=")
            .unwrap()
            .and_where("views", Vec::<i64>::new(), "NOT IN")
            .unwrap()
            .and_where("views", Vec::<i64>::new(), "IN")
            .unwrap()
            .build();
        assert_eq!(qb.statement().unwrap().sql, "SELECT * FROM posts WHERE 1 = 0");
    }

    #[test]
    fn test_limit_rejects_non_positive_count() {
        let mut session = Session::new(Canned::default());
        let mut qb = session.create_query_builder::<Post>().unwrap();
        qb.limit(-1, 0).limit(5, -1).limit(0, 0).build();
        assert_eq!(qb.statement().unwrap().sql, "SELECT * FROM posts");
    }

    #[test]
    fn test_mutation_after_build_requires_rebuild() {
        let mut session = Session::new(Canned::default());
        let mut qb = session.create_query_builder::<Post>().unwrap();
        assert!(matches!(qb.execute(), Err(OrmError::QueryNotBuilt)));

        qb.build();
        qb.order_by("id", "DESC").unwrap();
        assert!(matches!(qb.execute(), Err(OrmError::QueryNotBuilt)));
    }

    #[test]
    fn test_execute_shapes_results_and_tracks_rows() {
        let mut session = Session::new(Canned {
            rows: vec![row(1, "one", 10)],
            last_sql: None,
        });
        let result = session
            .create_query_builder::<Post>()
            .unwrap()
            .build()
            .execute()
            .unwrap();
        let QueryResult::One(handle) = result else {
            panic!("expected a single row, got {:?}", result);
        };
        let post = session.get(handle).unwrap();
        assert_eq!(post.id, Some(1));
        assert_eq!(post.title, "one");
        assert_eq!(session.tracking().changed_entries().count(), 0);

        session.database_mut().rows.push(row(2, "two", 20));
        let all = session
            .create_query_builder::<Post>()
            .unwrap()
            .build()
            .execute()
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_bad_row_tracks_nothing() {
        let mut bad = row(2, "two", 0);
        bad.insert("views".to_string(), DbValue::Text("many".to_string()));
        let mut session = Session::new(Canned {
            rows: vec![row(1, "one", 1), bad],
            last_sql: None,
        });

        let result = session
            .create_query_builder::<Post>()
            .unwrap()
            .build()
            .execute_all();
        assert!(matches!(result, Err(OrmError::TypeMismatch { .. })));
        assert!(session.tracking().is_empty());
    }

    #[test]
    fn test_hydrate_requires_every_column() {
        let schema = SchemaDescriptor::from_model::<Post>().unwrap();
        let mut partial = row(1, "x", 1);
        partial.remove("views");
        let err = hydrate::<Post>(&schema, partial).unwrap_err();
        assert_eq!(
            err,
            OrmError::MissingField {
                table: "posts".to_string(),
                column: "views".to_string(),
            }
        );

        let post: Post = hydrate(&schema, row(3, "y", 7)).unwrap();
        assert_eq!(post.field("views").unwrap(), Value::Integer(7));
    }
}
