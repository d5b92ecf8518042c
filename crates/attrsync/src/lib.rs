#![forbid(unsafe_code)]

//! Observable keyed-attribute store with batched change notification
//! and bidirectional string-store reflection.
//!
//! `attrsync` keeps two representations of the same state in sync: a
//! typed, in-memory canonical value per managed key, and an external
//! string-keyed store (the system of record for externally visible
//! state). Around that core it layers change callbacks, per-key
//! observers, and debounced batch delivery.
//!
//! # Architecture
//!
//! - [`Schema`] / [`SchemaRegistry`]: per-type, immutable declarations
//!   of managed keys — kind, mirroring, defaults, required flags — with
//!   external names computed once at finalization.
//! - [`PropertyHost`]: the per-instance engine. Writes go through an
//!   instance-private slot map; every effective change (old ≠ new) runs
//!   the change hook exactly once.
//! - [`ChangeBatch`] / [`Debouncer`]: changes within one batch window
//!   coalesce per key and deliver once, on the next tick or on
//!   [`flush`](PropertyHost::flush).
//! - [`AttributeStore`]: the external collaborator. Outbound reflection
//!   writes serialized values (Boolean keys presence-toggle); inbound
//!   deserialization reads entries back at attach time and on external
//!   changes, guarded against reflection feedback loops.
//! - [`Layer`] / [`Capabilities`]: behavior is composed from an ordered
//!   list of capability layers; composition is idempotent and each
//!   layer carries its prerequisites.
//!
//! The model is single-threaded and cooperative: shared handles are
//! `Rc`, mutation is synchronous within the call that triggers it, and
//! the only asynchrony is the debounce tick, which the embedding
//! delivers through the [`TickScheduler`] seam.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use attrsync::{
//!     compose, AttributeStore, Kind, KeySpec, Layer, MemoryAttributes,
//!     PropertyHost, Schema, Value,
//! };
//!
//! let schema = Rc::new(
//!     Schema::builder()
//!         .key(KeySpec::new("itemCount", Kind::Number).mirror())
//!         .key(KeySpec::new("disabled", Kind::Boolean).mirror())
//!         .finalize()
//!         .unwrap(),
//! );
//! let store = Rc::new(MemoryAttributes::new());
//! let mut host = PropertyHost::new(
//!     schema,
//!     Rc::clone(&store) as Rc<dyn AttributeStore>,
//!     compose(&[Layer::Attributes, Layer::Batching]),
//! );
//!
//! host.set("itemCount", Value::from(3)).unwrap();
//! host.set("disabled", Value::from(true)).unwrap();
//! assert_eq!(store.get_entry("item-count").as_deref(), Some("3"));
//! assert_eq!(store.get_entry("disabled").as_deref(), Some(""));
//!
//! let seen = Rc::new(std::cell::Cell::new(0));
//! let sink = Rc::clone(&seen);
//! host.on_batch(move |changes| sink.set(changes.len()));
//! host.flush();
//! assert_eq!(seen.get(), 2);
//! ```

pub mod batch;
pub mod host;
pub mod layer;
pub mod name;
pub mod reflect;
pub mod registry;
pub mod schema;
pub(crate) mod slots;
pub mod store;
pub mod value;

pub use batch::{ChangeBatch, Debouncer, ManualTicker, PropertyChange, TickHandle, TickScheduler};
pub use host::PropertyHost;
pub use layer::{Capabilities, Layer, compose};
pub use name::{to_camel_case, to_dash_case};
pub use reflect::{DefaultPolicy, FalsyPolicy};
pub use registry::SchemaRegistry;
pub use schema::{KeyId, KeySpec, PropertySpec, Schema, SchemaBuilder, SchemaError};
pub use store::{AttributeStore, MemoryAttributes};
pub use value::{DecodeError, Kind, Value, deserialize};
