#![forbid(unsafe_code)]

//! Integration tests: full property/attribute synchronization flows,
//! composed through the registry and capability layers the way an
//! embedding would do it.

use std::cell::RefCell;
use std::rc::Rc;

use attrsync::{
    AttributeStore, Capabilities, DefaultPolicy, Kind, KeySpec, Layer, ManualTicker,
    MemoryAttributes, PropertyChange, PropertyHost, SchemaRegistry, TickScheduler, Value, compose,
};

/// A toggle-like host type: a checked flag, a counter, and structured
/// metadata.
struct Toggle;

fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
}

fn toggle_host(
    registry: &SchemaRegistry,
    store: &Rc<MemoryAttributes>,
) -> PropertyHost {
    let schema = registry
        .get_or_finalize::<Toggle>(|b| {
            b.key(KeySpec::new("checked", Kind::Boolean).mirror())
                .key(
                    KeySpec::new("clickCount", Kind::Number)
                        .mirror()
                        .default(|| Value::from(0)),
                )
                .key(KeySpec::new("meta", Kind::Opaque).mirror())
                .key(KeySpec::new("internal", Kind::String))
        })
        .expect("schema finalizes");
    PropertyHost::new(
        schema,
        Rc::clone(store) as Rc<dyn AttributeStore>,
        compose(&[
            Layer::Attributes,
            Layer::Batching,
            Layer::Defaults,
            Layer::Observers,
        ]),
    )
}

// ============================================================================
// Composition
// ============================================================================

#[test]
fn registry_finalizes_once_across_host_constructions() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    let a = toggle_host(&registry, &store);
    let b = toggle_host(&registry, &store);
    assert!(Rc::ptr_eq(a.schema(), b.schema()));
    assert_eq!(registry.len(), 1);
}

#[test]
fn composed_capabilities_cover_the_full_stack() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    let host = toggle_host(&registry, &store);
    let caps = host.capabilities();
    for cap in [
        Capabilities::ACCESSORS,
        Capabilities::CHANGE_CALLBACK,
        Capabilities::OBSERVERS,
        Capabilities::BATCHING,
        Capabilities::REFLECT_OUT,
        Capabilities::DESERIALIZE_IN,
        Capabilities::DEFAULTS,
    ] {
        assert!(caps.contains(cap), "missing {cap:?}");
    }
}

// ============================================================================
// Markup-first lifecycle: entries exist before the host attaches
// ============================================================================

#[test]
fn attach_reads_markup_then_applies_defaults() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    store.set_entry("checked", "");

    let mut host = toggle_host(&registry, &store);
    host.attach().expect("attach succeeds");

    // Present entry deserialized; absent numeric key defaulted.
    assert_eq!(host.get("checked"), Some(&Value::from(true)));
    assert_eq!(host.get("clickCount"), Some(&Value::from(0)));
    // Default policy is Reflect: the applied default became visible.
    assert_eq!(store.get_entry("click-count").as_deref(), Some("0"));
    // Opaque key had no entry and no default.
    assert!(host.get("meta").is_none());
}

#[test]
fn deferred_defaults_leave_the_store_alone() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    let mut host =
        toggle_host(&registry, &store).with_default_policy(DefaultPolicy::Defer);
    host.attach().expect("attach succeeds");

    assert_eq!(host.get("clickCount"), Some(&Value::from(0)));
    assert!(!store.has_entry("click-count"));
}

#[test]
fn attach_fires_no_machinery_for_untouched_keys() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    store.set_entry("checked", "");

    let mut host = toggle_host(&registry, &store);
    let changed: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changed);
    host.on_change(move |key, _, _| sink.borrow_mut().push(key.to_owned()));

    host.attach().expect("attach succeeds");
    // `checked` (deserialized) and `clickCount` (defaulted) changed;
    // `meta` and `internal` must not appear.
    assert_eq!(*changed.borrow(), ["checked", "clickCount"]);
}

// ============================================================================
// Canonical → external → canonical round trips
// ============================================================================

#[test]
fn number_round_trips_through_the_store() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    let mut writer = toggle_host(&registry, &store);
    writer.set("clickCount", Value::from(10)).unwrap();
    assert_eq!(store.get_entry("click-count").as_deref(), Some("10"));

    // A second host over the same store reads the same canonical value.
    let mut reader = toggle_host(&registry, &store);
    reader.attach().expect("attach succeeds");
    assert_eq!(reader.get("clickCount"), Some(&Value::from(10)));
}

#[test]
fn opaque_round_trips_as_json() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    let meta = Value::Opaque(serde_json::json!({"tags": ["a", "b"], "rank": 3}));

    let mut writer = toggle_host(&registry, &store);
    writer.set("meta", meta.clone()).unwrap();

    let mut reader = toggle_host(&registry, &store);
    reader.attach().expect("attach succeeds");
    assert_eq!(reader.get("meta"), Some(&meta));
}

#[test]
fn malformed_opaque_entry_fails_attach_loudly() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    store.set_entry("meta", "{broken");

    let mut host = toggle_host(&registry, &store);
    assert!(host.attach().is_err());
}

// ============================================================================
// External edits while attached
// ============================================================================

#[test]
fn external_edit_propagates_without_feedback() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    let mut host = toggle_host(&registry, &store);
    host.attach().expect("attach succeeds");

    // Collect store-side notifications; the engine's own reflection of
    // the inbound value is the only write we expect.
    let notifications: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&notifications);
    store.set_on_change(move |name, _, _| sink.borrow_mut().push(name.to_owned()));

    store.set_entry("click-count", "5");
    host.attribute_changed("click-count", Some("0"), Some("5"))
        .expect("valid entry");

    assert_eq!(host.get("clickCount"), Some(&Value::from(5)));
    // The write-back rewrote the identical value, so the store saw only
    // the external edit itself.
    assert_eq!(*notifications.borrow(), ["click-count"]);
}

#[test]
fn removing_a_boolean_entry_unchecks() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    store.set_entry("checked", "");
    let mut host = toggle_host(&registry, &store);
    host.attach().expect("attach succeeds");
    assert_eq!(host.get("checked"), Some(&Value::from(true)));

    store.remove_entry("checked");
    host.attribute_changed("checked", Some(""), None)
        .expect("removal is fine");
    assert_eq!(host.get("checked"), Some(&Value::from(false)));
}

// ============================================================================
// Batch windows across a simulated event loop
// ============================================================================

#[test]
fn one_window_one_batch_in_write_order() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    let ticker = Rc::new(ManualTicker::new());
    let mut host = toggle_host(&registry, &store)
        .with_scheduler(Rc::clone(&ticker) as Rc<dyn TickScheduler>);

    let batches: Rc<RefCell<Vec<Vec<PropertyChange>>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&batches);
    host.on_batch(move |changes| sink.borrow_mut().push(changes.to_vec()));

    // Burst: three writes to one key, one write to another.
    host.set("clickCount", Value::from(1)).unwrap();
    host.set("clickCount", Value::from(2)).unwrap();
    host.set("checked", Value::from(true)).unwrap();
    host.set("clickCount", Value::from(3)).unwrap();

    // The event loop's tick elapses.
    let tick = ticker.take().expect("a tick is armed");
    assert!(host.deliver(tick));

    let batches = batches.borrow();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].key, "clickCount");
    assert_eq!(batch[0].old, None);
    assert_eq!(batch[0].new, Value::from(3));
    assert_eq!(batch[1].key, "checked");
}

#[test]
fn windows_never_overlap() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    let ticker = Rc::new(ManualTicker::new());
    let mut host = toggle_host(&registry, &store)
        .with_scheduler(Rc::clone(&ticker) as Rc<dyn TickScheduler>);

    let batches: Rc<RefCell<Vec<Vec<PropertyChange>>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&batches);
    host.on_batch(move |changes| sink.borrow_mut().push(changes.to_vec()));

    host.set("clickCount", Value::from(1)).unwrap();
    let first = ticker.take().expect("first window armed");
    assert!(host.deliver(first));

    host.set("clickCount", Value::from(2)).unwrap();
    let second = ticker.take().expect("second window armed");
    assert!(host.deliver(second));

    let batches = batches.borrow();
    assert_eq!(batches.len(), 2);
    // The second window's old value is the first window's new value.
    assert_eq!(batches[0][0].old, None);
    assert_eq!(batches[0][0].new, Value::from(1));
    assert_eq!(batches[1][0].old, Some(Value::from(1)));
    assert_eq!(batches[1][0].new, Value::from(2));
}

#[test]
fn flush_mid_window_then_fresh_window() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    let ticker = Rc::new(ManualTicker::new());
    let mut host = toggle_host(&registry, &store)
        .with_scheduler(Rc::clone(&ticker) as Rc<dyn TickScheduler>);

    let batches: Rc<RefCell<Vec<Vec<PropertyChange>>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&batches);
    host.on_batch(move |changes| sink.borrow_mut().push(changes.to_vec()));

    host.set("clickCount", Value::from(1)).unwrap();
    host.flush();

    // The flushed window's tick is stale now.
    assert_eq!(ticker.pending(), None);

    host.set("clickCount", Value::from(2)).unwrap();
    let tick = ticker.take().expect("fresh window armed");
    assert!(host.deliver(tick));

    let batches = batches.borrow();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0][0].new, Value::from(1));
    assert_eq!(batches[1][0].old, Some(Value::from(1)));
    assert_eq!(batches[1][0].new, Value::from(2));
}

#[test]
fn change_and_change_back_is_still_reported() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    let mut host = toggle_host(&registry, &store);

    let batches: Rc<RefCell<Vec<Vec<PropertyChange>>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&batches);
    host.on_batch(move |changes| sink.borrow_mut().push(changes.to_vec()));

    host.set("checked", Value::from(true)).unwrap();
    host.set("checked", Value::from(false)).unwrap();
    host.flush();

    let batches = batches.borrow();
    assert_eq!(batches[0].len(), 1, "no net-effect suppression");
    assert_eq!(batches[0][0].old, None);
    assert_eq!(batches[0][0].new, Value::from(false));
}

// ============================================================================
// Observers
// ============================================================================

#[test]
fn observers_track_one_key_only() {
    let registry = registry();
    let store = Rc::new(MemoryAttributes::new());
    let mut host = toggle_host(&registry, &store);

    let seen: Rc<RefCell<Vec<(Value, Option<Value>)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    host.observe("clickCount", move |new, old| {
        sink.borrow_mut().push((new.clone(), old.cloned()));
    })
    .unwrap();

    host.set("checked", Value::from(true)).unwrap();
    host.set("clickCount", Value::from(1)).unwrap();
    host.set("clickCount", Value::from(1)).unwrap(); // no-op

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], (Value::from(1), None));
}
