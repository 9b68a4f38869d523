//! ormx core - unit-of-work persistence engine
//!
//! This crate tracks in-memory model instances against their last known
//! database state and writes changes back in batched, per-table statements:
//! - Model trait, value model and the `impl_model!` accessor generator
//! - Schema registry resolving and caching per-type table metadata
//! - Tracking store (identity map with snapshots for dirty checking)
//! - Batch SQL generation for the UPDATE / INSERT / DELETE flush phases
//! - `Session`, the unit-of-work facade
//! - Query builder and repository hydrating rows into tracked instances
//!
//! Storage is reached only through the [`Database`] trait; see `ormx-store`
//! for the SQLite implementation.

pub mod batch;
pub mod config;
pub mod database;
pub mod dialect;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod query;
pub mod schema;
pub mod session;
pub mod tracking;

pub use ormx_core_types;

// Re-export commonly used types
pub use config::SessionConfig;
pub use database::{Database, Row};
pub use dialect::Dialect;
pub use errors::{ExError, ExErrorKind, OrmError, Result};
pub use model::value::{DbValue, FromValue, IntoValue, Value};
pub use model::{Entity, Handle, Identity, Model, Reference};
pub use query::{Criterion, QueryBuilder, QueryResult, Repository};
pub use schema::{
    ColumnDef, ColumnKind, ColumnSpec, ModelMetadata, ParameterKind, RelationSpec,
    SchemaDescriptor, SchemaRegistry,
};
pub use session::{FlushReport, Session};
pub use tracking::{EntryState, TrackingStore};
