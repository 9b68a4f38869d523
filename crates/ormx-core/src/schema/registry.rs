//! Schema registry
//!
//! Resolves each model type's metadata once and caches the validated
//! descriptor. The registry is shared read-mostly across sessions through an
//! `Arc`; lookups take a read lock, first resolution takes the write lock.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::errors::Result;
use crate::model::Model;
use crate::schema::SchemaDescriptor;

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    descriptors: RwLock<HashMap<TypeId, Arc<SchemaDescriptor>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the descriptor for `M`, computing it on first use
    ///
    /// Repeated calls return the same `Arc` until `invalidate::<M>()`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidation` if `M`'s metadata is invalid. Failures are
    /// not cached.
    pub fn resolve<M: Model>(&self) -> Result<Arc<SchemaDescriptor>> {
        let type_id = TypeId::of::<M>();
        if let Some(found) = self.lookup(type_id) {
            return Ok(found);
        }

        let mut descriptors = self
            .descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Another thread may have won the race while we waited.
        if let Some(found) = descriptors.get(&type_id) {
            return Ok(Arc::clone(found));
        }
        let descriptor = Arc::new(SchemaDescriptor::from_model::<M>()?);
        tracing::debug!(
            model = descriptor.model,
            table = %descriptor.table,
            columns = descriptor.columns.len(),
            "schema resolved"
        );
        descriptors.insert(type_id, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Drop the cached descriptor for `M`; the next `resolve` recomputes it
    pub fn invalidate<M: Model>(&self) -> bool {
        self.descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&TypeId::of::<M>())
            .is_some()
    }

    /// Cached descriptor by type id, if resolved
    pub fn lookup(&self, type_id: TypeId) -> Option<Arc<SchemaDescriptor>> {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
