//! The external string store collaborator.
//!
//! The engine does not own externally-visible state; it synchronizes
//! with a host-provided, string-keyed store behind [`AttributeStore`].
//! Implementations use interior mutability — the model is
//! single-threaded and store handles are shared via `Rc`.
//!
//! [`MemoryAttributes`] is the reference implementation, used by the
//! test suite and by embeddings that have no host store of their own.

use std::cell::RefCell;
use std::fmt;

use ahash::AHashMap;

/// Change notification: `(name, old, new)`. `None` means absent.
pub type EntryChanged = dyn Fn(&str, Option<&str>, Option<&str>);

/// A string-keyed entry store, the system of record for externally
/// visible state.
pub trait AttributeStore {
    /// Whether an entry exists.
    fn has_entry(&self, name: &str) -> bool;

    /// The entry's value, or `None` if absent.
    fn get_entry(&self, name: &str) -> Option<String>;

    /// Create or overwrite an entry.
    fn set_entry(&self, name: &str, value: &str);

    /// Remove an entry. Removing an absent entry is a no-op.
    fn remove_entry(&self, name: &str);

    /// Presence-toggle an entry: with `force`, create an empty-valued
    /// entry or remove it; without, invert current presence. Returns
    /// whether the entry is present afterwards.
    fn toggle_entry(&self, name: &str, force: Option<bool>) -> bool {
        let present = match force {
            Some(on) => on,
            None => !self.has_entry(name),
        };
        if present {
            self.set_entry(name, "");
        } else {
            self.remove_entry(name);
        }
        present
    }
}

/// In-memory [`AttributeStore`] with an optional change-notification
/// callback.
///
/// The callback fires on every effective mutation, whatever its source
/// — mirroring a host store that reports external edits too. Note that
/// the callback is invoked synchronously from inside `set_entry` /
/// `remove_entry`; embedders routing it back into a host should queue
/// rather than call into a mutably borrowed host.
#[derive(Default)]
pub struct MemoryAttributes {
    entries: RefCell<AHashMap<String, String>>,
    on_change: RefCell<Option<Box<EntryChanged>>>,
}

impl MemoryAttributes {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the change-notification callback, replacing any previous
    /// one.
    pub fn set_on_change(&self, callback: impl Fn(&str, Option<&str>, Option<&str>) + 'static) {
        *self.on_change.borrow_mut() = Some(Box::new(callback));
    }

    /// Number of entries currently present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Sorted `(name, value)` snapshot, for assertions and debugging.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = self
            .entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    fn notify(&self, name: &str, old: Option<&str>, new: Option<&str>) {
        if let Some(callback) = self.on_change.borrow().as_ref() {
            callback(name, old, new);
        }
    }
}

impl AttributeStore for MemoryAttributes {
    fn has_entry(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    fn get_entry(&self, name: &str) -> Option<String> {
        self.entries.borrow().get(name).cloned()
    }

    fn set_entry(&self, name: &str, value: &str) {
        let old = self
            .entries
            .borrow_mut()
            .insert(name.to_owned(), value.to_owned());
        if old.as_deref() != Some(value) {
            self.notify(name, old.as_deref(), Some(value));
        }
    }

    fn remove_entry(&self, name: &str) {
        let old = self.entries.borrow_mut().remove(name);
        if let Some(old) = old {
            self.notify(name, Some(&old), None);
        }
    }
}

impl fmt::Debug for MemoryAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryAttributes")
            .field("entries", &self.entries.borrow())
            .finish()
    }
}
