//! Property values stored in the committed graph.

use crate::key::ObjectKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The value of a scalar or reference property.
///
/// Amounts are carried as `Integer` minor units (cents); the store does not
/// know about currencies or scaling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Absent value. Every scalar and reference property accepts it.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// UTF-8 text.
    Text(String),
    /// Reference to another committed object.
    Reference(ObjectKey),
}

/// The declared type of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// `Value::Null`.
    Null,
    /// `Value::Bool`.
    Bool,
    /// `Value::Integer`.
    Integer,
    /// `Value::Text`.
    Text,
    /// `Value::Reference`.
    Reference,
}

impl Value {
    /// Creates a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Returns the type of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Integer(_) => ValueType::Integer,
            Value::Text(_) => ValueType::Text,
            Value::Reference(_) => ValueType::Reference,
        }
    }

    /// Returns true for `Value::Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer payload, if any.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean payload, if any.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the referenced key, if any.
    #[must_use]
    pub fn as_reference(&self) -> Option<ObjectKey> {
        match self {
            Value::Reference(k) => Some(*k),
            _ => None,
        }
    }

    /// Checks whether this value may be stored in a property of type `ty`.
    ///
    /// `Null` is accepted everywhere.
    #[must_use]
    pub fn conforms_to(&self, ty: ValueType) -> bool {
        self.is_null() || self.value_type() == ty
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<ObjectKey> for Value {
    fn from(k: ObjectKey) -> Self {
        Value::Reference(k)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Reference(k) => write!(f, "{k}"),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Integer => "integer",
            ValueType::Text => "text",
            ValueType::Reference => "reference",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_conforms_to_everything() {
        for ty in [
            ValueType::Bool,
            ValueType::Integer,
            ValueType::Text,
            ValueType::Reference,
        ] {
            assert!(Value::Null.conforms_to(ty));
        }
    }

    #[test]
    fn conforms_to_checks_type() {
        assert!(Value::Integer(5).conforms_to(ValueType::Integer));
        assert!(!Value::Integer(5).conforms_to(ValueType::Text));
        assert!(Value::text("x").conforms_to(ValueType::Text));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Integer(500).as_integer(), Some(500));
        assert_eq!(Value::text("memo").as_text(), Some("memo"));
        assert_eq!(
            Value::Reference(ObjectKey::new(4)).as_reference(),
            Some(ObjectKey::new(4))
        );
        assert_eq!(Value::Bool(true).as_integer(), None);
    }

    #[test]
    fn display() {
        assert_eq!(Value::Integer(-3).to_string(), "-3");
        assert_eq!(Value::text("a").to_string(), "\"a\"");
        assert_eq!(Value::Reference(ObjectKey::new(9)).to_string(), "obj:9");
        assert_eq!(ValueType::Reference.to_string(), "reference");
    }
}
