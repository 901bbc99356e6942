//! Typed configuration values.
//!
//! Configuration hands the engine a generic TOML tree. Anything that is going
//! to be written to a PV is first pulled out of that tree into a
//! [`TypedValue`]. The extraction never coerces: `"1"` stays text and `1`
//! stays an integer.

use crate::error::{EngineError, Result};
use std::fmt;

/// A primitive value taken from the configuration.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

/// Variant tag of a [`TypedValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    Float,
    Boolean,
    Text,
}

/// A number read back from a PV.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl TypedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::Integer(_) => ValueKind::Integer,
            TypedValue::Float(_) => ValueKind::Float,
            TypedValue::Boolean(_) => ValueKind::Boolean,
            TypedValue::Text(_) => ValueKind::Text,
        }
    }

    /// The numeric payload, for values usable as an increment delta.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            TypedValue::Integer(i) => Some(Number::Integer(*i)),
            TypedValue::Float(f) => Some(Number::Float(*f)),
            TypedValue::Boolean(_) | TypedValue::Text(_) => None,
        }
    }
}

impl From<Number> for TypedValue {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(i) => TypedValue::Integer(i),
            Number::Float(f) => TypedValue::Float(f),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Integer(i) => write!(f, "{}", i),
            TypedValue::Float(x) => write!(f, "{}", x),
            TypedValue::Boolean(b) => write!(f, "{}", b),
            TypedValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl ValueKind {
    /// Lowercase name used in messages.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::Text => "string",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueKind::Integer | ValueKind::Float)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Integer view of the number. Floats only convert when they hold an
    /// integral value inside the `i64` range.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Number::Integer(i) => Some(i),
            Number::Float(f) => {
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    Some(f as i64)
                } else {
                    None
                }
            }
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(i) => write!(f, "{}", i),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Name of a TOML node's type, for error messages.
pub(crate) fn toml_type_name(node: &toml::Value) -> &'static str {
    match node {
        toml::Value::String(_) => "string",
        toml::Value::Integer(_) => "integer",
        toml::Value::Float(_) => "float",
        toml::Value::Boolean(_) => "boolean",
        toml::Value::Datetime(_) => "datetime",
        toml::Value::Array(_) => "array",
        toml::Value::Table(_) => "table",
    }
}

/// Extract a [`TypedValue`] from a configuration node.
///
/// `context` names where the value came from and only shows up in the error.
pub fn extract_value(node: &toml::Value, context: &str) -> Result<TypedValue> {
    match node {
        toml::Value::String(s) => Ok(TypedValue::Text(s.clone())),
        toml::Value::Integer(i) => Ok(TypedValue::Integer(*i)),
        toml::Value::Float(f) => Ok(TypedValue::Float(*f)),
        toml::Value::Boolean(b) => Ok(TypedValue::Boolean(*b)),
        other => Err(EngineError::ValueExtraction {
            context: context.to_string(),
            found: toml_type_name(other),
        }),
    }
}
