//! Capability layers and their composition.
//!
//! A host's behavior is described by a set of [`Capabilities`], produced
//! by composing an ordered list of [`Layer`]s over the base accessor
//! descriptor. Each layer is a pure transformation of the descriptor and
//! carries its own prerequisites, so stacking layers can never yield a
//! descriptor with a dangling dependency (e.g. batching without change
//! callbacks). Composition is idempotent: applying a layer twice grants
//! nothing new.

use bitflags::bitflags;

bitflags! {
    /// The behavior descriptor for a host: which parts of the
    /// synchronization machinery are active.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Slot-map reads and writes. Always present.
        const ACCESSORS       = 1;
        /// Per-key change callback on every effective write.
        const CHANGE_CALLBACK = 1 << 1;
        /// Per-key registered observers.
        const OBSERVERS       = 1 << 2;
        /// Coalesced, debounced batch delivery.
        const BATCHING        = 1 << 3;
        /// Outbound reflection: canonical → external store.
        const REFLECT_OUT     = 1 << 4;
        /// Inbound deserialization: external store → canonical.
        const DESERIALIZE_IN  = 1 << 5;
        /// Default producers applied at attach.
        const DEFAULTS        = 1 << 6;
    }
}

/// A composable slice of synchronization behavior.
///
/// Layers mirror the historical capability stack: each one names a
/// cross-cutting concern and implies whatever it builds on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Slot-map accessors only.
    Accessors,
    /// Change callbacks on effective writes.
    ChangeNotification,
    /// Per-key observers.
    Observers,
    /// Debounced batch delivery.
    Batching,
    /// Outbound reflection to the external store.
    Reflection,
    /// Inbound deserialization from the external store.
    Deserialization,
    /// Attach-time defaults.
    Defaults,
    /// The full bidirectional sync stack: accessors, change callbacks,
    /// outbound reflection and inbound deserialization in one layer.
    Attributes,
}

impl Layer {
    /// The capabilities this layer grants, prerequisites included.
    #[must_use]
    pub fn grants(self) -> Capabilities {
        let base = Capabilities::ACCESSORS;
        let notified = base | Capabilities::CHANGE_CALLBACK;
        match self {
            Layer::Accessors => base,
            Layer::ChangeNotification => notified,
            Layer::Observers => notified | Capabilities::OBSERVERS,
            Layer::Batching => notified | Capabilities::BATCHING,
            Layer::Reflection => notified | Capabilities::REFLECT_OUT,
            Layer::Deserialization => notified | Capabilities::DESERIALIZE_IN,
            Layer::Defaults => notified | Capabilities::DEFAULTS,
            Layer::Attributes => {
                Layer::Reflection.grants() | Layer::Deserialization.grants()
            }
        }
    }
}

/// Compose an ordered list of layers into one behavior descriptor.
///
/// The base descriptor always carries [`Capabilities::ACCESSORS`]; an
/// empty list yields exactly that.
#[must_use]
pub fn compose(layers: &[Layer]) -> Capabilities {
    layers
        .iter()
        .fold(Capabilities::ACCESSORS, |caps, layer| caps | layer.grants())
}
