//! Per-type key schemas.
//!
//! A [`Schema`] is the immutable, per-type declaration of managed keys:
//! for each key its [`Kind`], whether it mirrors to the external store,
//! whether it participates in change batches, an optional default
//! producer, and whether it is required at attach time. Schemas are
//! built with [`SchemaBuilder`] and frozen by [`SchemaBuilder::finalize`];
//! nothing mutates a schema afterwards.
//!
//! # Invariants
//!
//! 1. Key order is declaration order and is stable for the schema's
//!    lifetime; [`KeyId`]s index into it.
//! 2. External names are computed exactly once, at finalization, via
//!    [`to_dash_case`](crate::name::to_dash_case).
//! 3. For mirrored keys the key ⇄ external-name mapping is a bijection;
//!    a collision fails finalization with [`SchemaError::AmbiguousEntry`].
//! 4. Opaque keys never mirror implicitly; [`KeySpec::mirror`] must be
//!    called for them just like for everything else, and doing so opts
//!    into JSON text in the external store.

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::name::to_dash_case;
use crate::value::{Kind, Value};

/// Index of a key within its [`Schema`], in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyId(u32);

impl KeyId {
    /// Position of the key in schema declaration order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Declaration of a single managed key, consumed by [`SchemaBuilder::key`].
pub struct KeySpec {
    name: String,
    kind: Kind,
    mirrored: bool,
    observe: bool,
    required: bool,
    default: Option<Rc<dyn Fn() -> Value>>,
}

impl KeySpec {
    /// Declare a key with the given name and value kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
            mirrored: false,
            observe: true,
            required: false,
            default: None,
        }
    }

    /// Mirror this key to the external store (outbound reflection and
    /// inbound deserialization). Off by default for every kind.
    #[must_use]
    pub fn mirror(mut self) -> Self {
        self.mirrored = true;
        self
    }

    /// Exclude this key from change batches. Per-key change callbacks
    /// and observers still fire.
    #[must_use]
    pub fn unobserved(mut self) -> Self {
        self.observe = false;
        self
    }

    /// Emit a diagnostic if the key is still unset after attach.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Provide a value at attach time when neither an explicit write nor
    /// inbound deserialization has set one. The producer must yield a
    /// value of this key's kind.
    #[must_use]
    pub fn default(mut self, producer: impl Fn() -> Value + 'static) -> Self {
        self.default = Some(Rc::new(producer));
        self
    }
}

impl fmt::Debug for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("mirrored", &self.mirrored)
            .field("observe", &self.observe)
            .field("required", &self.required)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// A finalized key declaration inside a [`Schema`].
pub struct PropertySpec {
    pub(crate) name: String,
    pub(crate) kind: Kind,
    pub(crate) mirrored: bool,
    pub(crate) observe: bool,
    pub(crate) required: bool,
    pub(crate) external: String,
    pub(crate) default: Option<Rc<dyn Fn() -> Value>>,
}

impl PropertySpec {
    /// The managed key name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key's value kind.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Whether the key syncs with the external store.
    #[must_use]
    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    /// Whether the key participates in change batches.
    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.observe
    }

    /// Whether the key must hold a value after attach.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The external store's name for this key.
    #[must_use]
    pub fn external_name(&self) -> &str {
        &self.external
    }

    /// Whether a default producer is declared.
    #[must_use]
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl fmt::Debug for PropertySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("mirrored", &self.mirrored)
            .field("observe", &self.observe)
            .field("required", &self.required)
            .field("external", &self.external)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Immutable per-type schema of managed keys.
pub struct Schema {
    specs: Vec<PropertySpec>,
    by_name: AHashMap<String, KeyId>,
    by_external: AHashMap<String, KeyId>,
}

impl Schema {
    /// Start declaring a schema.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder { keys: Vec::new() }
    }

    /// Number of declared keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the schema declares no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Resolve a key name to its id.
    #[must_use]
    pub fn key_id(&self, name: &str) -> Option<KeyId> {
        self.by_name.get(name).copied()
    }

    /// Resolve an external entry name to the mirrored key it belongs to.
    #[must_use]
    pub fn key_for_external(&self, external: &str) -> Option<KeyId> {
        self.by_external.get(external).copied()
    }

    /// The finalized declaration for a key.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this schema.
    #[must_use]
    pub fn spec(&self, id: KeyId) -> &PropertySpec {
        &self.specs[id.index()]
    }

    /// Iterate declarations in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (KeyId, &PropertySpec)> {
        self.specs
            .iter()
            .enumerate()
            .map(|(i, spec)| (KeyId(i as u32), spec))
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").field("keys", &self.specs).finish()
    }
}

/// Ordered collection of [`KeySpec`]s, frozen by [`finalize`](Self::finalize).
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    keys: Vec<KeySpec>,
}

impl SchemaBuilder {
    /// Add a key declaration.
    #[must_use]
    pub fn key(mut self, spec: KeySpec) -> Self {
        self.keys.push(spec);
        self
    }

    /// Freeze the schema: compute external names, verify the mirrored
    /// bijection, and hand back an immutable [`Schema`].
    ///
    /// # Errors
    ///
    /// [`SchemaError::DuplicateKey`] when two declarations share a name;
    /// [`SchemaError::AmbiguousEntry`] when two mirrored keys map to the
    /// same external name.
    pub fn finalize(self) -> Result<Schema, SchemaError> {
        let mut specs = Vec::with_capacity(self.keys.len());
        let mut by_name = AHashMap::with_capacity(self.keys.len());
        let mut by_external = AHashMap::new();

        for (i, key) in self.keys.into_iter().enumerate() {
            let id = KeyId(i as u32);
            let external = to_dash_case(&key.name);

            if by_name.insert(key.name.clone(), id).is_some() {
                return Err(SchemaError::DuplicateKey { key: key.name });
            }
            if key.mirrored {
                if let Some(&other) = by_external.get(&external) {
                    let other: &PropertySpec = &specs[KeyId::index(other)];
                    return Err(SchemaError::AmbiguousEntry {
                        entry: external,
                        keys: [other.name.clone(), key.name],
                    });
                }
                by_external.insert(external.clone(), id);
            }

            specs.push(PropertySpec {
                name: key.name,
                kind: key.kind,
                mirrored: key.mirrored,
                observe: key.observe,
                required: key.required,
                external,
                default: key.default,
            });
        }

        Ok(Schema {
            specs,
            by_name,
            by_external,
        })
    }
}

/// Schema declaration or lookup failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two declarations share a key name.
    DuplicateKey { key: String },
    /// Two mirrored keys translate to the same external entry name.
    AmbiguousEntry { entry: String, keys: [String; 2] },
    /// A key name does not exist in the schema.
    UnknownKey { key: String },
    /// A value of the wrong kind was written to a key.
    KindMismatch {
        key: String,
        expected: Kind,
        got: Kind,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey { key } => write!(f, "key '{key}' is declared twice"),
            Self::AmbiguousEntry { entry, keys } => write!(
                f,
                "keys '{}' and '{}' both map to external entry '{entry}'",
                keys[0], keys[1]
            ),
            Self::UnknownKey { key } => write!(f, "key '{key}' is not declared"),
            Self::KindMismatch {
                key,
                expected,
                got,
            } => write!(f, "key '{key}' expects {expected:?} values, got {got:?}"),
        }
    }
}

impl std::error::Error for SchemaError {}
