//! Batched change notification: coalescing, debouncing, delivery.
//!
//! Every effective write funnels into a per-instance [`ChangeBatch`].
//! Writes to the same key within one batch window collapse into a
//! single [`PropertyChange`] whose `old` is the value before the first
//! write of the window and whose `new` is the value after the last.
//! Delivery is debounced: each write cancels the pending tick and arms
//! a fresh one, so the batch goes out once, after the synchronous burst
//! of writes settles.
//!
//! There is no timer here. The debounce delay is "the next
//! microtask-equivalent tick", so the [`Debouncer`] hands out
//! generation-tagged [`TickHandle`]s and the embedding decides when a
//! tick elapses — through a [`TickScheduler`] hooked to its event loop,
//! or [`ManualTicker`] when the embedding pumps by hand.
//!
//! # Invariants
//!
//! 1. A key appears at most once per delivered batch; delivery order is
//!    first-write order within the window.
//! 2. A coalesced entry's `old` is never overwritten by later writes in
//!    the same window.
//! 3. Arming the debouncer invalidates the previously armed handle;
//!    completing or cancelling consumes the armed handle. A stale handle
//!    can never deliver.
//! 4. Keys that change and change back to their original value still
//!    appear in the batch. Net-effect suppression is deliberately not
//!    performed.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Stale tick delivered | superseded or flushed window | no-op, reported as stale |
//! | Tick never delivered | embedding stopped pumping | batch stays pending until `flush()` |

use std::cell::Cell;

use ahash::AHashMap;

use crate::schema::KeyId;
use crate::value::Value;

/// One coalesced change record: the key plus its value before the batch
/// window began and after the last write in it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyChange {
    /// The managed key name.
    pub key: String,
    /// Canonical value before the first write of the window; `None` if
    /// the key was unset.
    pub old: Option<Value>,
    /// Canonical value after the last write of the window.
    pub new: Value,
}

/// Pending coalesced changes for one batch window.
#[derive(Debug, Default)]
pub struct ChangeBatch {
    entries: Vec<PropertyChange>,
    index: AHashMap<KeyId, usize>,
}

impl ChangeBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a write into the batch. A key already pending keeps its
    /// recorded `old`; only `new` is updated.
    pub fn record(&mut self, id: KeyId, key: &str, old: Option<Value>, new: Value) {
        if let Some(&at) = self.index.get(&id) {
            self.entries[at].new = new;
        } else {
            self.index.insert(id, self.entries.len());
            self.entries.push(PropertyChange {
                key: key.to_owned(),
                old,
                new,
            });
        }
    }

    /// Number of distinct keys pending.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drain the pending changes, leaving the batch empty. Called as
    /// part of delivery, before the batch callback runs, so a re-entrant
    /// flush cannot observe (or re-deliver) the same window.
    #[must_use]
    pub fn take(&mut self) -> Vec<PropertyChange> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }
}

/// Identifies one armed debounce tick. Stale handles are inert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

/// Single-slot debounce state: at most one armed tick per instance.
#[derive(Debug, Default)]
pub struct Debouncer {
    next: u64,
    armed: Option<TickHandle>,
}

impl Debouncer {
    /// Create a disarmed debouncer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fresh tick, invalidating the previous one. Returns the new
    /// handle and the cancelled one, if any.
    pub fn arm(&mut self) -> (TickHandle, Option<TickHandle>) {
        let cancelled = self.armed.take();
        self.next += 1;
        let handle = TickHandle(self.next);
        self.armed = Some(handle);
        (handle, cancelled)
    }

    /// Disarm, returning the cancelled handle if one was armed.
    pub fn cancel(&mut self) -> Option<TickHandle> {
        self.armed.take()
    }

    /// Whether a tick is currently armed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Consume `handle` if it is the armed one. `true` means the caller
    /// owns this window's delivery; `false` means the handle was stale.
    pub fn complete(&mut self, handle: TickHandle) -> bool {
        if self.armed == Some(handle) {
            self.armed = None;
            true
        } else {
            false
        }
    }
}

/// The embedding's view of debounce timing.
///
/// The engine reports every (re)arm and cancellation; the embedding
/// fires the armed tick back into the host when its notion of "one tick
/// with no further writes" has elapsed.
pub trait TickScheduler {
    /// A tick was armed (any previously armed tick is now stale).
    fn armed(&self, tick: TickHandle);

    /// An armed tick was superseded by a newer write or consumed by a
    /// flush. Most schedulers can ignore this; stale ticks are inert.
    fn cancelled(&self, tick: TickHandle) {
        let _ = tick;
    }
}

/// Hand-pumped [`TickScheduler`]: remembers the most recently armed
/// tick so a test (or a poll-driven embedding) can deliver it when
/// convenient.
#[derive(Debug, Default)]
pub struct ManualTicker {
    pending: Cell<Option<TickHandle>>,
}

impl ManualTicker {
    /// Create a ticker with no pending tick.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The armed tick, if any, without consuming it.
    #[must_use]
    pub fn pending(&self) -> Option<TickHandle> {
        self.pending.get()
    }

    /// Take the armed tick for delivery.
    #[must_use]
    pub fn take(&self) -> Option<TickHandle> {
        self.pending.take()
    }
}

impl TickScheduler for ManualTicker {
    fn armed(&self, tick: TickHandle) {
        self.pending.set(Some(tick));
    }

    fn cancelled(&self, tick: TickHandle) {
        if self.pending.get() == Some(tick) {
            self.pending.set(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{KeySpec, Schema};
    use crate::value::Kind;

    fn two_keys() -> (Schema, KeyId, KeyId) {
        let schema = Schema::builder()
            .key(KeySpec::new("a", Kind::Number))
            .key(KeySpec::new("b", Kind::Number))
            .finalize()
            .unwrap();
        let a = schema.key_id("a").unwrap();
        let b = schema.key_id("b").unwrap();
        (schema, a, b)
    }

    // ── Coalescing ──────────────────────────────────────────────────

    #[test]
    fn repeated_writes_coalesce_keeping_first_old() {
        let (_, a, _) = two_keys();
        let mut batch = ChangeBatch::new();
        batch.record(a, "a", Some(Value::from(1)), Value::from(2));
        batch.record(a, "a", Some(Value::from(2)), Value::from(3));
        batch.record(a, "a", Some(Value::from(3)), Value::from(4));

        let changes = batch.take();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old, Some(Value::from(1)));
        assert_eq!(changes[0].new, Value::from(4));
    }

    #[test]
    fn distinct_keys_get_distinct_entries_in_write_order() {
        let (_, a, b) = two_keys();
        let mut batch = ChangeBatch::new();
        batch.record(b, "b", None, Value::from(1));
        batch.record(a, "a", None, Value::from(2));

        let changes = batch.take();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].key, "b");
        assert_eq!(changes[1].key, "a");
    }

    #[test]
    fn change_and_change_back_still_appears() {
        let (_, a, _) = two_keys();
        let mut batch = ChangeBatch::new();
        batch.record(a, "a", Some(Value::from(1)), Value::from(2));
        batch.record(a, "a", Some(Value::from(2)), Value::from(1));

        let changes = batch.take();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old, Some(Value::from(1)));
        assert_eq!(changes[0].new, Value::from(1));
    }

    #[test]
    fn take_resets_the_window() {
        let (_, a, _) = two_keys();
        let mut batch = ChangeBatch::new();
        batch.record(a, "a", None, Value::from(1));
        let _ = batch.take();
        assert!(batch.is_empty());

        // A later write starts a fresh record with its own old value.
        batch.record(a, "a", Some(Value::from(1)), Value::from(2));
        let changes = batch.take();
        assert_eq!(changes[0].old, Some(Value::from(1)));
    }

    // ── Debouncer ───────────────────────────────────────────────────

    #[test]
    fn arming_cancels_the_previous_handle() {
        let mut debounce = Debouncer::new();
        let (first, none) = debounce.arm();
        assert_eq!(none, None);
        let (second, cancelled) = debounce.arm();
        assert_eq!(cancelled, Some(first));

        assert!(!debounce.complete(first), "stale handle must not deliver");
        assert!(debounce.complete(second));
    }

    #[test]
    fn complete_consumes_the_window() {
        let mut debounce = Debouncer::new();
        let (tick, _) = debounce.arm();
        assert!(debounce.complete(tick));
        assert!(!debounce.complete(tick), "double delivery is impossible");
        assert!(!debounce.is_armed());
    }

    #[test]
    fn cancel_disarms() {
        let mut debounce = Debouncer::new();
        let (tick, _) = debounce.arm();
        assert_eq!(debounce.cancel(), Some(tick));
        assert!(!debounce.complete(tick));
        assert_eq!(debounce.cancel(), None);
    }

    // ── ManualTicker ────────────────────────────────────────────────

    #[test]
    fn ticker_tracks_the_latest_armed_tick() {
        let mut debounce = Debouncer::new();
        let ticker = ManualTicker::new();

        let (first, _) = debounce.arm();
        ticker.armed(first);
        let (second, cancelled) = debounce.arm();
        if let Some(stale) = cancelled {
            ticker.cancelled(stale);
        }
        ticker.armed(second);

        assert_eq!(ticker.take(), Some(second));
        assert_eq!(ticker.take(), None);
    }

    #[test]
    fn cancelling_a_stale_tick_leaves_a_newer_one_pending() {
        let ticker = ManualTicker::new();
        let mut debounce = Debouncer::new();
        let (first, _) = debounce.arm();
        let (second, _) = debounce.arm();
        ticker.armed(second);
        ticker.cancelled(first);
        assert_eq!(ticker.pending(), Some(second));
    }
}
