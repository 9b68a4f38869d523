//! Repository: convenience lookups over the query builder
//!
//! Every lookup orders by the primary key ascending.

use std::marker::PhantomData;

use crate::database::Database;
use crate::errors::Result;
use crate::model::value::Value;
use crate::model::{Handle, Model};
use crate::query::QueryBuilder;
use crate::session::Session;

pub struct Repository<'s, M: Model, D: Database> {
    session: &'s mut Session<D>,
    _model: PhantomData<fn() -> M>,
}

impl<'s, M: Model, D: Database> Repository<'s, M, D> {
    pub(crate) fn new(session: &'s mut Session<D>) -> Self {
        Self {
            session,
            _model: PhantomData,
        }
    }

    /// A fresh query builder for `M`
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidation` if `M`'s metadata is invalid.
    pub fn create_query_builder(&mut self) -> Result<QueryBuilder<'_, M, D>> {
        QueryBuilder::new(&mut *self.session)
    }

    /// The instance whose primary key is `id`
    ///
    /// # Errors
    ///
    /// Propagates query and hydration errors.
    pub fn find(&mut self, id: i64) -> Result<Option<Handle<M>>> {
        let primary_key = self.session.schema::<M>()?.primary_key.clone();
        Ok(self
            .find_by(&[(primary_key.as_str(), Value::Integer(id))])?
            .into_iter()
            .next())
    }

    /// Every row of the table
    ///
    /// # Errors
    ///
    /// Propagates query and hydration errors.
    pub fn find_all(&mut self) -> Result<Vec<Handle<M>>> {
        self.find_by(&[])
    }

    /// Rows where every `(property, value)` pair is equal
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` for undeclared properties and propagates
    /// query and hydration errors.
    pub fn find_by(&mut self, criteria: &[(&str, Value)]) -> Result<Vec<Handle<M>>> {
        let primary_key = self.session.schema::<M>()?.primary_key.clone();
        let mut qb = self.create_query_builder()?;
        for (property, value) in criteria {
            qb.and_where(property, value.clone(), "=")?;
        }
        qb.order_by(&primary_key, "ASC")?;
        qb.build().execute_all()
    }
}
