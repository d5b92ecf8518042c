//! The composed per-instance synchronization engine.
//!
//! A [`PropertyHost`] owns one instance's slot map, pending batch and
//! debounce state, and wires them to a shared [`AttributeStore`]
//! according to the [`Capabilities`] it was composed with. All mutation
//! is synchronous within the call that triggers it — a direct
//! [`set`](PropertyHost::set) or an external-store change routed through
//! [`attribute_changed`](PropertyHost::attribute_changed); the only
//! asynchrony is the debounce tick, delivered by the embedding via
//! [`deliver`](PropertyHost::deliver) or forced with
//! [`flush`](PropertyHost::flush).
//!
//! # Invariants
//!
//! 1. The change callback and observers fire exactly once per effective
//!    transition (old ≠ new), in write order.
//! 2. Batch delivery for a window happens strictly after every write in
//!    that window and strictly before any write of the next window.
//! 3. Outbound reflection never re-triggers inbound deserialization for
//!    the same write: the host marks itself as reflecting while it
//!    writes the store, and `attribute_changed` ignores notifications
//!    that arrive under that mark.
//! 4. A write of an equal value is a no-op end to end: no callback, no
//!    observer, no store write, no batch entry.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown key | undeclared name in `set`/`observe` | `SchemaError::UnknownKey` |
//! | Kind mismatch | wrong-shaped value in `set` | `SchemaError::KindMismatch` |
//! | Malformed entry | bad Number/Opaque text inbound | `DecodeError` propagates |
//! | Required key unset | nothing provided it by attach | `tracing::warn!`, continues |

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::batch::{ChangeBatch, Debouncer, PropertyChange, TickHandle, TickScheduler};
use crate::layer::Capabilities;
use crate::reflect::{self, DefaultPolicy, FalsyPolicy};
use crate::schema::{KeyId, Schema, SchemaError};
use crate::slots::{Slots, WriteOutcome};
use crate::store::AttributeStore;
use crate::value::{self, DecodeError, Kind, Value};

type ChangeCallback = dyn FnMut(&str, Option<&Value>, &Value);
type BatchCallback = dyn FnMut(&[PropertyChange]);
type Observer = dyn FnMut(&Value, Option<&Value>);

/// One instance of the property/attribute synchronization engine.
pub struct PropertyHost {
    schema: Rc<Schema>,
    store: Rc<dyn AttributeStore>,
    caps: Capabilities,
    falsy: FalsyPolicy,
    defaults: DefaultPolicy,
    slots: Slots,
    batch: ChangeBatch,
    debounce: Debouncer,
    scheduler: Option<Rc<dyn TickScheduler>>,
    reflecting: bool,
    on_change: Option<Box<ChangeCallback>>,
    on_batch: Option<Box<BatchCallback>>,
    observers: AHashMap<KeyId, Box<Observer>>,
}

impl PropertyHost {
    /// Create a host over a finalized schema and a shared store, with
    /// the given composed capabilities and default policies.
    #[must_use]
    pub fn new(schema: Rc<Schema>, store: Rc<dyn AttributeStore>, caps: Capabilities) -> Self {
        let slots = Slots::new(schema.len());
        Self {
            schema,
            store,
            caps,
            falsy: FalsyPolicy::default(),
            defaults: DefaultPolicy::default(),
            slots,
            batch: ChangeBatch::new(),
            debounce: Debouncer::new(),
            scheduler: None,
            reflecting: false,
            on_change: None,
            on_batch: None,
            observers: AHashMap::new(),
        }
    }

    /// Choose the falsy outbound-reflection policy.
    #[must_use]
    pub fn with_falsy_policy(mut self, policy: FalsyPolicy) -> Self {
        self.falsy = policy;
        self
    }

    /// Choose whether attach-time defaults reflect outward.
    #[must_use]
    pub fn with_default_policy(mut self, policy: DefaultPolicy) -> Self {
        self.defaults = policy;
        self
    }

    /// Attach a scheduler to be told about debounce arms/cancels.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Rc<dyn TickScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// The schema this host was composed with.
    #[must_use]
    pub fn schema(&self) -> &Rc<Schema> {
        &self.schema
    }

    /// The composed behavior descriptor.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Install the per-key change callback `(key, old, new)`.
    pub fn on_change(&mut self, callback: impl FnMut(&str, Option<&Value>, &Value) + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    /// Install the coalesced batch callback.
    pub fn on_batch(&mut self, callback: impl FnMut(&[PropertyChange]) + 'static) {
        self.on_batch = Some(Box::new(callback));
    }

    /// Register the observer for one key, invoked as `(new, old)` after
    /// the global change callback.
    ///
    /// # Errors
    ///
    /// [`SchemaError::UnknownKey`] for an undeclared key.
    pub fn observe(
        &mut self,
        key: &str,
        observer: impl FnMut(&Value, Option<&Value>) + 'static,
    ) -> Result<(), SchemaError> {
        let id = self.key_id(key)?;
        self.observers.insert(id, Box::new(observer));
        Ok(())
    }

    /// Read a key's canonical value. `None` if the key was never set
    /// (or is undeclared).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        let id = self.schema.key_id(key)?;
        self.slots.get(id)
    }

    /// Write a key's canonical value. Fires the change machinery only
    /// when the value actually differs from the stored one.
    ///
    /// # Errors
    ///
    /// [`SchemaError::UnknownKey`] for an undeclared key;
    /// [`SchemaError::KindMismatch`] when the value's shape does not
    /// match the declaration.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), SchemaError> {
        let id = self.key_id(key)?;
        let expected = self.schema.spec(id).kind;
        if value.kind() != expected {
            return Err(SchemaError::KindMismatch {
                key: key.to_owned(),
                expected,
                got: value.kind(),
            });
        }
        self.write(id, value, true);
        Ok(())
    }

    /// Whether the host is currently writing the external store on its
    /// own behalf. Embedders that deliver store notifications
    /// synchronously consult this to break the reflection cycle;
    /// [`attribute_changed`](Self::attribute_changed) checks it itself.
    #[must_use]
    pub fn is_reflecting(&self) -> bool {
        self.reflecting
    }

    /// Number of distinct keys pending in the current batch window.
    #[must_use]
    pub fn pending_changes(&self) -> usize {
        self.batch.len()
    }

    /// Deliver the batch for an armed tick. Returns `false` (and does
    /// nothing) when the handle is stale — superseded by a later write
    /// or consumed by a flush.
    pub fn deliver(&mut self, tick: TickHandle) -> bool {
        if !self.debounce.complete(tick) {
            return false;
        }
        self.fire();
        true
    }

    /// Cancel the pending tick and deliver whatever is pending right
    /// now, possibly an empty batch. A later write starts a fresh,
    /// independent window.
    pub fn flush(&mut self) {
        if let Some(stale) = self.debounce.cancel() {
            if let Some(scheduler) = &self.scheduler {
                scheduler.cancelled(stale);
            }
        }
        self.fire();
    }

    /// Run attach-time synchronization: inbound deserialization for
    /// mirrored keys, then defaults, then required-key diagnostics.
    ///
    /// # Errors
    ///
    /// [`DecodeError`] from a malformed external entry. Keys processed
    /// before the failure keep their deserialized values.
    pub fn attach(&mut self) -> Result<(), DecodeError> {
        let schema = Rc::clone(&self.schema);

        if self.caps.contains(Capabilities::DESERIALIZE_IN) {
            for (id, spec) in schema.iter() {
                if !spec.mirrored || self.slots.get(id).is_some() {
                    continue;
                }
                let Some(text) = self.store.get_entry(&spec.external) else {
                    continue;
                };
                let value = value::deserialize(spec.kind, &text)?;
                self.write(id, value, true);
            }
        }

        if self.caps.contains(Capabilities::DEFAULTS) {
            let reflect_defaults = self.defaults == DefaultPolicy::Reflect;
            for (id, spec) in schema.iter() {
                if self.slots.get(id).is_some() {
                    continue;
                }
                let Some(producer) = &spec.default else {
                    continue;
                };
                let value = producer();
                if value.kind() != spec.kind {
                    tracing::warn!(
                        key = %spec.name,
                        expected = ?spec.kind,
                        got = ?value.kind(),
                        "default producer yielded a mismatched kind; skipping"
                    );
                    continue;
                }
                self.write(id, value, reflect_defaults);
            }
        }

        for (id, spec) in schema.iter() {
            if spec.required && self.slots.get(id).is_none() {
                tracing::warn!(key = %spec.name, "required key has no value after attach");
            }
        }

        Ok(())
    }

    /// React to an external-store entry change `(name, old, new)`.
    ///
    /// Ignored entirely when inbound deserialization is not composed,
    /// when the host itself caused the change (reflection in progress),
    /// when the value did not actually change, or when the name does not
    /// belong to a mirrored key. Entry removal assigns `false` to
    /// Boolean keys (presence semantics) and leaves other kinds alone.
    ///
    /// # Errors
    ///
    /// [`DecodeError`] from malformed Number/Opaque text.
    pub fn attribute_changed(
        &mut self,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) -> Result<(), DecodeError> {
        if !self.caps.contains(Capabilities::DESERIALIZE_IN) || self.reflecting || old == new {
            return Ok(());
        }
        let Some(id) = self.schema.key_for_external(name) else {
            return Ok(());
        };
        let kind = self.schema.spec(id).kind;

        match new {
            Some(text) => {
                let value = value::deserialize(kind, text)?;
                self.write(id, value, true);
            }
            None => {
                if kind == Kind::Boolean {
                    self.write(id, Value::Bool(false), true);
                }
            }
        }
        Ok(())
    }

    fn key_id(&self, key: &str) -> Result<KeyId, SchemaError> {
        self.schema
            .key_id(key)
            .ok_or_else(|| SchemaError::UnknownKey {
                key: key.to_owned(),
            })
    }

    /// The accessor-layer write: store the value, then run the change
    /// hook once if the slot actually transitioned.
    fn write(&mut self, id: KeyId, value: Value, allow_reflect: bool) {
        let new = value.clone();
        match self.slots.write(id, value) {
            WriteOutcome::Unchanged => {}
            WriteOutcome::Changed { old } => self.changed(id, old, &new, allow_reflect),
        }
    }

    /// The change hook: callback, observer, outbound reflection, batch.
    fn changed(&mut self, id: KeyId, old: Option<Value>, new: &Value, allow_reflect: bool) {
        let schema = Rc::clone(&self.schema);
        let spec = schema.spec(id);

        if self.caps.contains(Capabilities::CHANGE_CALLBACK) {
            if let Some(callback) = self.on_change.as_mut() {
                callback(&spec.name, old.as_ref(), new);
            }
        }

        if self.caps.contains(Capabilities::OBSERVERS) {
            if let Some(observer) = self.observers.get_mut(&id) {
                observer(new, old.as_ref());
            }
        }

        if allow_reflect && spec.mirrored && self.caps.contains(Capabilities::REFLECT_OUT) {
            self.reflecting = true;
            reflect::outbound(
                self.store.as_ref(),
                &spec.external,
                spec.kind,
                new,
                self.falsy,
            );
            self.reflecting = false;
        }

        if spec.observe && self.caps.contains(Capabilities::BATCHING) {
            self.batch.record(id, &spec.name, old, new.clone());
            let (tick, cancelled) = self.debounce.arm();
            if let Some(scheduler) = &self.scheduler {
                if let Some(stale) = cancelled {
                    scheduler.cancelled(stale);
                }
                scheduler.armed(tick);
            }
        }
    }

    /// Deliver and clear the pending batch. State is cleared before the
    /// callback runs, so re-entrant flushes see an empty window.
    fn fire(&mut self) {
        let changes = self.batch.take();
        if let Some(callback) = self.on_batch.as_mut() {
            callback(&changes);
        }
    }
}

impl fmt::Debug for PropertyHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyHost")
            .field("keys", &self.schema.len())
            .field("caps", &self.caps)
            .field("pending_changes", &self.batch.len())
            .field("reflecting", &self.reflecting)
            .finish()
    }
}
