//! Remote type classification and write compatibility.
//!
//! Control systems expose many scalar type names (`byte`, `short`, `int`,
//! `long`, `ubyte`, `ushort`, `uint`, `ulong`, `enum_t`, ...). The engine does
//! not keep a list of them. Names are classified case-insensitively:
//!
//! | Remote type          | Accepts                       |
//! |----------------------|-------------------------------|
//! | `float`, `double`    | float, integer (widened)      |
//! | `boolean`            | boolean                       |
//! | `string`             | string                        |
//! | anything else        | integer                       |
//!
//! **The last row is a catch-all.** Any name not listed above, including
//! names the engine has never seen, is treated as an integer type. That keeps
//! new integer-like types working, and it means a misreported type is
//! checked as if it were an integer.

use crate::client::Field;
use crate::value::ValueKind;
use std::fmt;

const ENUM_TYPE: &str = "enum_t";

/// Type name reported by a client for a channel's `value` field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteType(String);

/// Compatibility class of a [`RemoteType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeFamily {
    Float,
    Boolean,
    Text,
    Integer,
}

impl RemoteType {
    pub fn new(name: impl Into<String>) -> Self {
        RemoteType(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn family(&self) -> TypeFamily {
        let name = self.0.as_str();
        if name.eq_ignore_ascii_case("float") || name.eq_ignore_ascii_case("double") {
            TypeFamily::Float
        } else if name.eq_ignore_ascii_case("boolean") {
            TypeFamily::Boolean
        } else if name.eq_ignore_ascii_case("string") {
            TypeFamily::Text
        } else {
            TypeFamily::Integer
        }
    }

    /// True for the enumerated-choice type, whose writes go to `value.index`.
    pub fn is_enum(&self) -> bool {
        self.0.eq_ignore_ascii_case(ENUM_TYPE)
    }

    /// Field that reads and writes for this type should target.
    pub fn target_field(&self) -> Field {
        if self.is_enum() {
            Field::ValueIndex
        } else {
            Field::Value
        }
    }
}

impl fmt::Display for RemoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a value of `kind` may be written to a PV of type `remote`.
pub fn is_compatible(remote: &RemoteType, kind: ValueKind) -> bool {
    match remote.family() {
        TypeFamily::Float => matches!(kind, ValueKind::Float | ValueKind::Integer),
        TypeFamily::Boolean => kind == ValueKind::Boolean,
        TypeFamily::Text => kind == ValueKind::Text,
        TypeFamily::Integer => kind == ValueKind::Integer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(remote: &str, kind: ValueKind) -> bool {
        is_compatible(&RemoteType::new(remote), kind)
    }

    #[test]
    fn float_types_accept_floats_and_integers() {
        assert!(check("double", ValueKind::Float));
        assert!(check("double", ValueKind::Integer));
        assert!(!check("double", ValueKind::Text));
        assert!(!check("double", ValueKind::Boolean));
        assert!(check("float", ValueKind::Float));
        assert!(check("float", ValueKind::Integer));
    }

    #[test]
    fn boolean_and_string_are_strict() {
        assert!(check("boolean", ValueKind::Boolean));
        assert!(!check("boolean", ValueKind::Integer));
        assert!(!check("boolean", ValueKind::Text));
        assert!(check("string", ValueKind::Text));
        assert!(!check("string", ValueKind::Integer));
        assert!(!check("string", ValueKind::Boolean));
    }

    #[test]
    fn other_names_are_integer_only() {
        for name in ["int16", "int", "short", "ubyte", "ulong", "enum_t", "mystery"] {
            assert!(check(name, ValueKind::Integer), "{name}");
            assert!(!check(name, ValueKind::Float), "{name}");
            assert!(!check(name, ValueKind::Text), "{name}");
            assert!(!check(name, ValueKind::Boolean), "{name}");
        }
    }

    #[test]
    fn classification_ignores_case() {
        assert_eq!(RemoteType::new("DOUBLE").family(), TypeFamily::Float);
        assert_eq!(RemoteType::new("Boolean").family(), TypeFamily::Boolean);
        assert_eq!(RemoteType::new("String").family(), TypeFamily::Text);
        assert!(RemoteType::new("ENUM_T").is_enum());
    }

    #[test]
    fn enum_targets_index_field() {
        assert_eq!(RemoteType::new("enum_t").target_field(), Field::ValueIndex);
        assert_eq!(RemoteType::new("double").target_field(), Field::Value);
        assert_eq!(RemoteType::new("int").target_field(), Field::Value);
    }
}
