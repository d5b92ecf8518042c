//! Reflection policies and the outbound adapter.
//!
//! Outbound reflection writes a mirrored key's canonical value back to
//! the external store on every effective change. Boolean keys use
//! presence semantics; everything else writes the serialized surface
//! form, with the falsy case decided by [`FalsyPolicy`] — the historical
//! variants disagreed on it, so it is configuration here, not a guess.
//!
//! The inbound direction (attach-time deserialization, external change
//! notifications, defaults, required diagnostics) lives on the host,
//! since it assigns through the accessor layer.

use crate::store::AttributeStore;
use crate::value::{Kind, Value};

/// What outbound reflection does with a falsy non-Boolean value
/// (empty string, zero, NaN, JSON null).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FalsyPolicy {
    /// Write the serialized form like any other value.
    #[default]
    Write,
    /// Remove the external entry instead of writing it.
    Remove,
}

/// Whether defaults applied at attach reflect to the external store
/// immediately, or only on the next explicit write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DefaultPolicy {
    /// Applied defaults reflect outward right away.
    #[default]
    Reflect,
    /// Applied defaults stay canonical-only until the next write.
    Defer,
}

/// Write one changed value to the external store.
pub(crate) fn outbound(
    store: &dyn AttributeStore,
    external: &str,
    kind: Kind,
    value: &Value,
    falsy: FalsyPolicy,
) {
    match kind {
        Kind::Boolean => {
            store.toggle_entry(external, Some(value.is_truthy()));
        }
        _ => {
            if falsy == FalsyPolicy::Remove && value.is_falsy() {
                store.remove_entry(external);
            } else {
                store.set_entry(external, &value.serialize());
            }
        }
    }
}
