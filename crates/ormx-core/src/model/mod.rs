//! Model instances, identities and handles
//!
//! A model is a plain struct whose columns are typed fields. `impl_model!`
//! generates the by-name accessors and the metadata declaration, so the
//! engine never needs reflection. The tracking store owns every instance it
//! knows about; callers hold typed [`Handle`]s into it.

pub mod macros;
pub mod value;

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::Serialize;

use crate::errors::Result;
use crate::schema::ModelMetadata;
use value::Value;

/// Process-stable identity of a tracked instance
///
/// Distinct from the database primary key, which is absent until the first
/// successful INSERT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Identity(u64);

impl Identity {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A persistable record type
///
/// Implemented through [`impl_model!`](crate::impl_model); hand-written
/// implementations must keep `field` / `set_field` consistent with the
/// columns declared in `metadata`.
pub trait Model: Any + Clone + fmt::Debug + Default {
    /// Metadata collaborator output: table, primary key, columns, relations
    fn metadata() -> ModelMetadata;

    fn primary_key(&self) -> Option<i64>;

    fn set_primary_key(&mut self, pk: Option<i64>);

    /// Read a column (or the primary key) by name
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` for names the model does not declare.
    fn field(&self, name: &str) -> Result<Value>;

    /// Assign a column (or the primary key) by name
    ///
    /// # Errors
    ///
    /// Returns `UnknownProperty` for undeclared names and `TypeMismatch` when
    /// the value does not fit the field's Rust type.
    fn set_field(&mut self, name: &str, value: Value) -> Result<()>;
}

/// Object-safe view of a model, used by the tracking store
pub trait Entity: Any + fmt::Debug {
    fn key(&self) -> Option<i64>;

    fn set_key(&mut self, pk: Option<i64>);

    /// # Errors
    ///
    /// Returns `UnknownProperty` for names the model does not declare.
    fn column_value(&self, name: &str) -> Result<Value>;

    fn model_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<M: Model> Entity for M {
    fn key(&self) -> Option<i64> {
        self.primary_key()
    }

    fn set_key(&mut self, pk: Option<i64>) {
        self.set_primary_key(pk);
    }

    fn column_value(&self, name: &str) -> Result<Value> {
        self.field(name)
    }

    fn model_name(&self) -> &'static str {
        std::any::type_name::<M>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Typed reference to an instance owned by a session
pub struct Handle<M> {
    identity: Identity,
    _model: PhantomData<fn() -> M>,
}

impl<M> Handle<M> {
    pub(crate) fn new(identity: Identity) -> Self {
        Self {
            identity,
            _model: PhantomData,
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }
}

impl<M> Clone for Handle<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Handle<M> {}

impl<M> PartialEq for Handle<M> {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl<M> Eq for Handle<M> {}

impl<M> Hash for Handle<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl<M> fmt::Debug for Handle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("model", &std::any::type_name::<M>())
            .field("identity", &self.identity)
            .finish()
    }
}

/// Slot for a lazily loaded many-to-one relation
///
/// The join key lives in an ordinary column; this slot only caches the
/// resolved target once `Session::load_reference` has run.
pub enum Reference<T> {
    /// Not looked up yet
    Unloaded,
    /// Resolved to a tracked instance
    Loaded(Handle<T>),
    /// Looked up, no row matched (or the join key is null)
    Absent,
}

impl<T> Reference<T> {
    pub fn is_loaded(&self) -> bool {
        !matches!(self, Reference::Unloaded)
    }

    pub fn handle(&self) -> Option<Handle<T>> {
        match self {
            Reference::Loaded(handle) => Some(*handle),
            _ => None,
        }
    }

    /// Forget the cached target, e.g. after changing the join key
    pub fn reset(&mut self) {
        *self = Reference::Unloaded;
    }
}

impl<T> Default for Reference<T> {
    fn default() -> Self {
        Reference::Unloaded
    }
}

impl<T> Clone for Reference<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Reference<T> {}

impl<T> PartialEq for Reference<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Reference::Unloaded, Reference::Unloaded) => true,
            (Reference::Absent, Reference::Absent) => true,
            (Reference::Loaded(a), Reference::Loaded(b)) => a == b,
            _ => false,
        }
    }
}

impl<T> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Unloaded => write!(f, "Unloaded"),
            Reference::Loaded(handle) => f.debug_tuple("Loaded").field(handle).finish(),
            Reference::Absent => write!(f, "Absent"),
        }
    }
}
