//! Canonical values and their external string forms.
//!
//! A managed key stores a typed [`Value`] in memory while the external
//! store only ever holds strings. [`Kind`] names the four supported
//! shapes and drives both directions of the conversion:
//!
//! - `String` — passthrough.
//! - `Number` — display formatting out, numeric parse in.
//! - `Boolean` — presence semantics: `true` serializes to the empty
//!   string, deserialization of any present entry yields `true`.
//! - `Opaque` — JSON text both ways.
//!
//! # Invariants
//!
//! 1. `deserialize(kind, serialize(v))` round-trips String, Number and
//!    Boolean values (Boolean through presence, see [`Kind::Boolean`]).
//! 2. Malformed Number and Opaque entries surface as [`DecodeError`];
//!    they are never silently coerced.
//! 3. Equality on [`Value`] is structural, including the Opaque variant.
//!    Re-assigning an equal opaque value is a no-op at the accessor
//!    layer; mutating shared data elsewhere does not count as a change.

use std::fmt;

/// The shape of a managed key's canonical value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Kind {
    /// Plain text; external form is the value itself.
    String,
    /// `f64` numbers; external form is the display representation.
    Number,
    /// Presence-toggled flags. A `true` value maps to a present,
    /// empty-valued external entry; `false` maps to entry absence.
    Boolean,
    /// Structured data carried as JSON in the external store. Never
    /// auto-mirrored; mirroring must be requested explicitly.
    Opaque,
}

/// A canonical, typed value for a managed key.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
    Opaque(serde_json::Value),
}

impl Value {
    /// The [`Kind`] this value belongs to.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Value::Str(_) => Kind::String,
            Value::Num(_) => Kind::Number,
            Value::Bool(_) => Kind::Boolean,
            Value::Opaque(_) => Kind::Opaque,
        }
    }

    /// Whether the value counts as falsy for reflection policy purposes:
    /// the empty string, zero, NaN, `false`, or JSON `null`.
    #[must_use]
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Str(s) => s.is_empty(),
            Value::Num(n) => *n == 0.0 || n.is_nan(),
            Value::Bool(b) => !b,
            Value::Opaque(v) => v.is_null(),
        }
    }

    /// Inverse of [`Value::is_falsy`].
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        !self.is_falsy()
    }

    /// The surface-textual representation written to the external store.
    ///
    /// Boolean values serialize to the empty string regardless of their
    /// payload; whether the entry exists at all is decided by the
    /// presence-toggle in the outbound reflection adapter, not here.
    #[must_use]
    pub fn serialize(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Num(n) => n.to_string(),
            Value::Bool(_) => String::new(),
            Value::Opaque(v) => v.to_string(),
        }
    }

    /// Borrow the string payload, if this is a `Str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The numeric payload, if this is a `Num`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean payload, if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Num(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Num(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Opaque(v)
    }
}

/// Deserialize an external entry's text into a canonical value.
///
/// Boolean deserialization ignores the text entirely: the entry being
/// present is what carries the `true`. Callers handle absence themselves
/// (an absent boolean entry means `false`).
///
/// # Errors
///
/// [`DecodeError::Number`] when the text does not parse as `f64`;
/// [`DecodeError::Opaque`] when the text is not valid JSON.
pub fn deserialize(kind: Kind, text: &str) -> Result<Value, DecodeError> {
    match kind {
        Kind::String => Ok(Value::Str(text.to_owned())),
        Kind::Number => text
            .trim()
            .parse::<f64>()
            .map(Value::Num)
            .map_err(|_| DecodeError::Number {
                text: text.to_owned(),
            }),
        Kind::Boolean => Ok(Value::Bool(true)),
        Kind::Opaque => serde_json::from_str(text)
            .map(Value::Opaque)
            .map_err(|err| DecodeError::Opaque {
                text: text.to_owned(),
                reason: err.to_string(),
            }),
    }
}

/// Failure to decode an external entry into a canonical value.
///
/// Propagated to the caller of inbound deserialization; swallowing a
/// malformed payload would hide data corruption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A Number entry did not parse as `f64`.
    Number { text: String },
    /// An Opaque entry was not valid JSON.
    Opaque { text: String, reason: String },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number { text } => write!(f, "entry '{text}' is not a number"),
            Self::Opaque { text, reason } => {
                write!(f, "entry '{text}' is not valid structured data: {reason}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}
