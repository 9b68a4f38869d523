//! Unit-of-work session
//!
//! A `Session` owns one tracking store and one database connection. Callers
//! hand instances to it (`persist`, `track`), mutate them through handles,
//! mark them for deletion (`remove`) and finally `flush`, which writes every
//! pending change in three phases: UPDATE, then INSERT, then DELETE. Each
//! phase issues one statement per table.
//!
//! Write failures abort the flush at the failing table. Tables already
//! written keep their bookkeeping, so a retry only touches what is still
//! pending.

use std::any::TypeId;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::batch::{self, Phase, Statement, TableBatch};
use crate::config::SessionConfig;
use crate::database::Database;
use crate::errors::{OrmError, Result};
use crate::model::{Handle, Identity, Model, Reference};
use crate::ormx_core_types::SessionId;
use crate::query::{QueryBuilder, Repository};
use crate::schema::{SchemaDescriptor, SchemaRegistry};
use crate::tracking::{EntryState, TrackingStore};
use crate::{log_op_end, log_op_error, log_op_start};

/// Rows written by one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub updated: u64,
    pub inserted: u64,
    pub deleted: u64,
    pub statements: usize,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.statements == 0
    }
}

pub struct Session<D: Database> {
    pub(crate) id: SessionId,
    pub(crate) db: D,
    pub(crate) store: TrackingStore,
    pub(crate) registry: Arc<SchemaRegistry>,
    pub(crate) config: SessionConfig,
}

impl<D: Database> Session<D> {
    /// Session with its own schema registry and default configuration
    pub fn new(db: D) -> Self {
        Self::with_registry(db, Arc::new(SchemaRegistry::new()), SessionConfig::default())
    }

    /// Session sharing `registry` with other sessions
    pub fn with_registry(db: D, registry: Arc<SchemaRegistry>, config: SessionConfig) -> Self {
        Self {
            id: SessionId::new(),
            db,
            store: TrackingStore::new(),
            registry,
            config,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn database_mut(&mut self) -> &mut D {
        &mut self.db
    }

    pub fn tracking(&self) -> &TrackingStore {
        &self.store
    }

    /// Consume the session, returning its connection
    pub fn into_database(self) -> D {
        self.db
    }

    /// Resolve `M`'s schema through the shared registry
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidation` if `M`'s metadata is invalid.
    pub fn schema<M: Model>(&self) -> Result<Arc<SchemaDescriptor>> {
        self.registry.resolve::<M>()
    }

    /// Register a new instance; it is inserted on the next flush
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidation` if `M`'s metadata is invalid.
    pub fn persist<M: Model>(&mut self, instance: M) -> Result<Handle<M>> {
        let schema = self.schema::<M>()?;
        let identity = self.store.allocate();
        if let Some(pk) = instance.primary_key() {
            tracing::warn!(
                session_id = %self.id,
                table = %schema.table,
                pk,
                "persist called on an instance that already has a primary key; scheduling upsert"
            );
            self.store.set_stale(identity, Box::new(instance), schema);
        } else {
            self.store.set_new(identity, Box::new(instance), schema);
        }
        Ok(Handle::new(identity))
    }

    /// Register an instance known to match its database row
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidation` if `M`'s metadata is invalid.
    pub fn track<M: Model>(&mut self, instance: M) -> Result<Handle<M>> {
        let schema = self.schema::<M>()?;
        let identity = self.store.allocate();
        self.store
            .set_tracked(identity, Box::new(instance), schema)?;
        Ok(Handle::new(identity))
    }

    /// Take a fresh snapshot of a live instance
    ///
    /// # Errors
    ///
    /// Returns `NotTracked` if the handle has no live instance.
    pub fn retrack<M: Model>(&mut self, handle: Handle<M>) -> Result<()> {
        if self.store.retrack(handle.identity())? {
            Ok(())
        } else {
            Err(not_tracked(handle.identity()))
        }
    }

    /// Drop the live instance; a persisted one is deleted on the next flush
    ///
    /// Returns the dropped instance, or `None` if the handle had none.
    pub fn remove<M: Model>(&mut self, handle: Handle<M>) -> Option<M> {
        self.store
            .unset_current(handle.identity())
            .and_then(|entity| entity.into_any().downcast::<M>().ok())
            .map(|boxed| *boxed)
    }

    /// Stop tracking without writing anything
    pub fn clean<M: Model>(&mut self, handle: Handle<M>) -> bool {
        self.store.clean(handle.identity())
    }

    pub fn contains<M: Model>(&self, handle: Handle<M>) -> bool {
        self.store.contains(handle.identity())
    }

    pub fn state<M: Model>(&self, handle: Handle<M>) -> Option<EntryState> {
        self.store.state(handle.identity())
    }

    pub fn get<M: Model>(&self, handle: Handle<M>) -> Option<&M> {
        self.store
            .entity(handle.identity())
            .and_then(|entity| entity.as_any().downcast_ref::<M>())
    }

    pub fn get_mut<M: Model>(&mut self, handle: Handle<M>) -> Option<&mut M> {
        self.store
            .entity_mut(handle.identity())
            .and_then(|entity| entity.as_any_mut().downcast_mut::<M>())
    }

    /// Render an instance as a JSON object of primary key and columns
    ///
    /// Removed entries render their snapshot.
    ///
    /// # Errors
    ///
    /// Returns `NotTracked` for unknown handles and `Serialization` if a
    /// column value has no JSON form.
    pub fn dump<M: Model>(&self, handle: Handle<M>) -> Result<serde_json::Value> {
        let entry = self
            .store
            .get(handle.identity())
            .ok_or_else(|| not_tracked(handle.identity()))?;
        let schema = entry.schema();

        let mut object = serde_json::Map::new();
        match (entry.current(), entry.snapshot()) {
            (Some(entity), _) => {
                object.insert(schema.primary_key.clone(), entity.key().into());
                for column in &schema.columns {
                    let value = entity.column_value(&column.name)?;
                    object.insert(column.name.clone(), to_json(&column.name, &value)?);
                }
            }
            (None, Some(snapshot)) => {
                object.insert(schema.primary_key.clone(), snapshot.primary_key.into());
                for (column, value) in schema.columns.iter().zip(&snapshot.values) {
                    object.insert(column.name.clone(), to_json(&column.name, value)?);
                }
            }
            (None, None) => {}
        }
        Ok(serde_json::Value::Object(object))
    }

    /// Repository for `M` borrowing this session
    pub fn repository<M: Model>(&mut self) -> Repository<'_, M, D> {
        Repository::new(self)
    }

    /// Query builder for `M` borrowing this session
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidation` if `M`'s metadata is invalid.
    pub fn create_query_builder<M: Model>(&mut self) -> Result<QueryBuilder<'_, M, D>> {
        QueryBuilder::new(self)
    }

    /// Resolve a many-to-one relation of a tracked instance
    ///
    /// `field` names the relation's join-key column and `slot` selects the
    /// `Reference` field that caches the result. A cached slot is returned
    /// without touching the database; otherwise the target repository is
    /// asked for the row whose join property equals the key, and the first
    /// match (tracked like any query result) is stored in the slot.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` if `field` is not a declared relation,
    /// `SchemaValidation` if the relation targets a type other than `T`,
    /// `NotTracked` if the handle has no live instance, and any query error.
    pub fn load_reference<M: Model, T: Model>(
        &mut self,
        handle: Handle<M>,
        field: &str,
        slot: fn(&mut M) -> &mut Reference<T>,
    ) -> Result<Option<Handle<T>>> {
        let schema = self.schema::<M>()?;
        let relation = schema
            .relation(field)
            .ok_or_else(|| OrmError::UnknownProperty {
                property: field.to_string(),
                model: schema.model.to_string(),
            })?;
        if relation.target != TypeId::of::<T>() {
            return Err(OrmError::SchemaValidation {
                model: schema.model.to_string(),
                reason: format!(
                    "relation {} targets {}, not {}",
                    field,
                    relation.target_name,
                    std::any::type_name::<T>()
                ),
            });
        }

        let instance = self
            .get_mut(handle)
            .ok_or_else(|| not_tracked(handle.identity()))?;
        match *slot(instance) {
            Reference::Loaded(target) => return Ok(Some(target)),
            Reference::Absent => return Ok(None),
            Reference::Unloaded => {}
        }
        let key = instance.field(field)?;

        let resolved = if key.is_null() {
            None
        } else {
            self.repository::<T>()
                .find_by(&[(relation.join_property.as_str(), key)])?
                .into_iter()
                .next()
        };

        let instance = self
            .get_mut(handle)
            .ok_or_else(|| not_tracked(handle.identity()))?;
        *slot(instance) = match resolved {
            Some(target) => Reference::Loaded(target),
            None => Reference::Absent,
        };
        Ok(resolved)
    }

    /// Write every pending change
    ///
    /// Phases run in the order UPDATE, INSERT, DELETE; within a phase one
    /// statement is issued per table. After each table's statement succeeds
    /// its instances are re-tracked (UPDATE, INSERT, with database assigned
    /// keys applied) or purged (DELETE).
    ///
    /// # Errors
    ///
    /// Returns `MissingField` / `TypeMismatch` if a row cannot be built and
    /// `WriteFailed` if a statement errors or affects no rows. Later tables
    /// and phases are not attempted.
    ///
    /// A multi-row INSERT whose generated ids the driver fails to report is
    /// also `WriteFailed`, but its rows are already in the database. Those
    /// instances stay `New` with no key, and flushing them again inserts
    /// them a second time; `clean` them or reload them with a query first.
    /// A single-row INSERT falls back to `last_insert_id` instead.
    pub fn flush(&mut self) -> Result<FlushReport> {
        let start = Instant::now();
        log_op_start!("flush", session_id = %self.id, tracked = self.store.len());

        let result = self.flush_phases();
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(report) => {
                log_op_end!(
                    "flush",
                    duration_ms = duration_ms,
                    session_id = %self.id,
                    updated = report.updated,
                    inserted = report.inserted,
                    deleted = report.deleted,
                    statements = report.statements
                );
            }
            Err(err) => {
                log_op_error!("flush", err.clone(), duration_ms = duration_ms, session_id = %self.id);
            }
        }
        result
    }

    fn flush_phases(&mut self) -> Result<FlushReport> {
        let mut report = FlushReport::default();
        for phase in Phase::ORDER {
            let batches = match phase {
                Phase::Update => batch::collect(self.store.changed_entries(), phase)?,
                Phase::Insert => batch::collect(self.store.new_entries(), phase)?,
                Phase::Delete => batch::collect(self.store.removed_entries(), phase)?,
            };
            for table_batch in batches.into_values() {
                match phase {
                    Phase::Update => self.write_updates(&table_batch, &mut report)?,
                    Phase::Insert => self.write_inserts(&table_batch, &mut report)?,
                    Phase::Delete => self.write_deletes(&table_batch, &mut report)?,
                }
            }
        }
        Ok(report)
    }

    fn write_updates(&mut self, table_batch: &TableBatch, report: &mut FlushReport) -> Result<()> {
        let statement = self.render(table_batch, Phase::Update);
        self.execute_write(Phase::Update, table_batch, &statement)?;
        report.statements += 1;
        for identity in &table_batch.members {
            self.store.retrack(*identity)?;
        }
        report.updated += table_batch.row_count() as u64;
        Ok(())
    }

    fn write_inserts(&mut self, table_batch: &TableBatch, report: &mut FlushReport) -> Result<()> {
        if self.db.reports_batch_ids() {
            let statement = self.render(table_batch, Phase::Insert);
            self.execute_write(Phase::Insert, table_batch, &statement)?;
            report.statements += 1;

            let rows = table_batch.row_count();
            let ids = match self.db.generated_ids(rows).filter(|ids| ids.len() == rows) {
                Some(ids) => ids,
                None if rows == 1 => {
                    let id = self.db.last_insert_id().ok_or_else(|| {
                        self.write_failed(Phase::Insert, table_batch, "driver reported no insert id")
                    })?;
                    vec![id]
                }
                None => {
                    tracing::warn!(
                        session_id = %self.id,
                        table = %self.config.table_name(&table_batch.table),
                        rows = rows,
                        "rows inserted without generated ids"
                    );
                    return Err(self.write_failed(
                        Phase::Insert,
                        table_batch,
                        format!(
                            "{} rows written but the driver did not report their generated ids",
                            rows
                        ),
                    ));
                }
            };
            for (identity, id) in table_batch.members.iter().zip(ids) {
                self.assign_key(*identity, id)?;
            }
            report.inserted += rows as u64;
        } else {
            // One row per statement so every generated id can be read back.
            for single in table_batch.single_rows() {
                let statement = self.render(&single, Phase::Insert);
                self.execute_write(Phase::Insert, &single, &statement)?;
                report.statements += 1;

                let id = self.db.last_insert_id().ok_or_else(|| {
                    self.write_failed(Phase::Insert, &single, "driver reported no insert id")
                })?;
                for identity in &single.members {
                    self.assign_key(*identity, id)?;
                }
                report.inserted += 1;
            }
        }
        Ok(())
    }

    fn write_deletes(&mut self, table_batch: &TableBatch, report: &mut FlushReport) -> Result<()> {
        let statement = self.render(table_batch, Phase::Delete);
        let affected = self.execute_write(Phase::Delete, table_batch, &statement)?;
        report.statements += 1;
        for identity in &table_batch.members {
            self.store.clean(*identity);
        }
        report.deleted += affected;
        Ok(())
    }

    fn assign_key(&mut self, identity: Identity, id: i64) -> Result<()> {
        let entity = self
            .store
            .entity_mut(identity)
            .ok_or_else(|| not_tracked(identity))?;
        entity.set_key(Some(id));
        self.store.retrack(identity)?;
        Ok(())
    }

    fn render(&self, table_batch: &TableBatch, phase: Phase) -> Statement {
        table_batch.render(phase, self.db.dialect(), &self.config.table_prefix)
    }

    fn write_failed(
        &self,
        phase: Phase,
        table_batch: &TableBatch,
        reason: impl Into<String>,
    ) -> OrmError {
        OrmError::WriteFailed {
            phase: phase.to_string(),
            table: self.config.table_name(&table_batch.table),
            reason: reason.into(),
        }
    }

    fn execute_write(
        &mut self,
        phase: Phase,
        table_batch: &TableBatch,
        statement: &Statement,
    ) -> Result<u64> {
        if self.config.log_parameters {
            tracing::trace!(
                session_id = %self.id,
                phase = phase.as_str(),
                sql = %statement.sql,
                params = ?statement.params,
                "write statement"
            );
        }

        let affected = self
            .db
            .execute(&statement.sql, &statement.params)
            .map_err(|err| self.write_failed(phase, table_batch, err.to_string()))?;

        tracing::debug!(
            session_id = %self.id,
            table = %table_batch.table,
            phase = phase.as_str(),
            row_count = table_batch.row_count(),
            affected,
            param_count = statement.params.len(),
            "table written"
        );

        if affected == 0 {
            return Err(self.write_failed(phase, table_batch, "0 rows affected"));
        }
        Ok(affected)
    }
}

fn to_json<T: Serialize + ?Sized>(column: &str, value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| OrmError::Serialization {
        column: column.to_string(),
        message: e.to_string(),
    })
}

fn not_tracked(identity: Identity) -> OrmError {
    OrmError::NotTracked {
        identity: identity.get(),
    }
}
