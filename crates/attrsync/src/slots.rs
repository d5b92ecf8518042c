//! Instance-private slot storage for canonical values.
//!
//! One slot per declared key, indexed by [`KeyId`]. The slot map is
//! created at host construction and never visible outside the accessor
//! layer; change detection (old ≠ new, reference/primitive equality via
//! `PartialEq`) lives here.

use crate::schema::KeyId;
use crate::value::Value;

/// Outcome of a slot write.
#[derive(Debug, PartialEq)]
pub(crate) enum WriteOutcome {
    /// The new value equals the stored one; nothing happened.
    Unchanged,
    /// The slot transitioned; `old` is the value before the write
    /// (`None` for a first write).
    Changed { old: Option<Value> },
}

/// Per-instance canonical value slots.
#[derive(Debug, Default)]
pub(crate) struct Slots {
    values: Vec<Option<Value>>,
}

impl Slots {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            values: vec![None; len],
        }
    }

    pub(crate) fn get(&self, id: KeyId) -> Option<&Value> {
        self.values[id.index()].as_ref()
    }

    /// Store `value`, reporting whether the slot actually changed.
    pub(crate) fn write(&mut self, id: KeyId, value: Value) -> WriteOutcome {
        let slot = &mut self.values[id.index()];
        if slot.as_ref() == Some(&value) {
            return WriteOutcome::Unchanged;
        }
        let old = slot.replace(value);
        WriteOutcome::Changed { old }
    }
}
