//! Per-type schema registry.
//!
//! Cooperating capability layers may each require a finalized schema as
//! a precondition, so finalization must tolerate being requested
//! redundantly. [`SchemaRegistry`] holds one entry per host type,
//! created on first request and returned as-is afterwards; the builder
//! closure runs at most once per type.
//!
//! The registry is an explicit value threaded through calls — there is
//! no hidden global keyed by type identity.

use std::any::TypeId;
use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::schema::{Schema, SchemaBuilder, SchemaError};

/// Registry of finalized schemas, one per host type.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: RefCell<AHashMap<TypeId, Rc<Schema>>>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the finalized schema for `T`, building and finalizing it
    /// on first request. Redundant calls are cheap membership checks;
    /// `declare` does not run again.
    ///
    /// # Errors
    ///
    /// Propagates [`SchemaError`] from finalization. A failed
    /// finalization leaves no entry behind, so a later call may retry
    /// with a corrected declaration.
    pub fn get_or_finalize<T: 'static>(
        &self,
        declare: impl FnOnce(SchemaBuilder) -> SchemaBuilder,
    ) -> Result<Rc<Schema>, SchemaError> {
        let type_id = TypeId::of::<T>();
        if let Some(schema) = self.entries.borrow().get(&type_id) {
            return Ok(Rc::clone(schema));
        }

        let schema = Rc::new(declare(Schema::builder()).finalize()?);
        self.entries
            .borrow_mut()
            .insert(type_id, Rc::clone(&schema));
        Ok(schema)
    }

    /// Whether `T` already has a finalized schema.
    #[must_use]
    pub fn is_finalized<T: 'static>(&self) -> bool {
        self.entries.borrow().contains_key(&TypeId::of::<T>())
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether no type has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
