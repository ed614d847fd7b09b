//! Property value types
//!
//! This module defines `Value`, the fixed set of property types an entity
//! may carry.
//!
//! ## Type Rules
//!
//! - Eight variants only: Null, Bool, Int, Float, String, Bytes, Key, Array
//! - No implicit type coercions
//! - `Int(1) != Float(1.0)` - different types are NEVER equal
//! - `Bytes` are not `String`
//! - Float uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`

use crate::key::Key;
use serde::{Deserialize, Serialize};

/// Canonical property value type
///
/// ## Type Equality
///
/// Different types are never equal, even when they hold the same "value":
/// - `Int(1) != Float(1.0)`
/// - `Bytes(b"hi") != String("hi")`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point (IEEE-754)
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Reference to another entity by key
    Key(Key),
    /// Array of values
    Array(Vec<Value>),
}

// Custom PartialEq implementation for IEEE-754 float semantics
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // IEEE-754: NaN != NaN, -0.0 == 0.0
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Key(a), Value::Key(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            // Different types are never equal
            _ => false,
        }
    }
}

impl Value {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Key(_) => "Key",
            Value::Array(_) => "Array",
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as bool if this is a Bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float value
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as &[u8] if this is a Bytes value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get as &Key if this is a Key value
    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Value::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Get as &[Value] if this is an Array value
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Key> for Value {
    fn from(k: Key) -> Self {
        Value::Key(k)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "Null");
        assert_eq!(Value::Bool(true).type_name(), "Bool");
        assert_eq!(Value::Int(1).type_name(), "Int");
        assert_eq!(Value::Float(1.0).type_name(), "Float");
        assert_eq!(Value::String("s".into()).type_name(), "String");
        assert_eq!(Value::Bytes(vec![]).type_name(), "Bytes");
        assert_eq!(Value::Array(vec![]).type_name(), "Array");
    }

    #[test]
    fn test_same_type_equality() {
        assert_eq!(Value::Int(1), Value::Int(1));
        assert_eq!(Value::String("a".into()), Value::String("a".into()));
        assert_ne!(Value::Int(1), Value::Int(2));
    }

    #[test]
    fn test_cross_type_never_equal() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Bytes(b"hi".to_vec()), Value::String("hi".into()));
        assert_ne!(Value::Null, Value::Bool(false));
    }

    #[test]
    fn test_float_ieee754_semantics() {
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(Value::Float(-0.0), Value::Float(0.0));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert_eq!(Value::Float(2.5).as_float(), Some(2.5));
        assert_eq!(Value::String("x".into()).as_str(), Some("x"));
        assert_eq!(Value::Bytes(vec![1]).as_bytes(), Some(&[1u8][..]));
        assert_eq!(Value::Int(7).as_str(), None);
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_key_value() {
        let key = Key::with_id("p", None, "Kind", 1).unwrap();
        let value = Value::from(key.clone());
        assert_eq!(value.as_key(), Some(&key));
        assert_eq!(value.type_name(), "Key");
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from(1.5f64), Value::Float(1.5));
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(
            Value::from(vec![Value::Int(1)]),
            Value::Array(vec![Value::Int(1)])
        );
    }

    #[test]
    fn test_array_equality() {
        let a = Value::Array(vec![Value::Int(1), Value::String("x".into())]);
        let b = Value::Array(vec![Value::Int(1), Value::String("x".into())]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_serde_roundtrip() {
        let value = Value::Array(vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(-3),
            Value::String("s".into()),
            Value::Bytes(vec![0, 1, 2]),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, back);
    }
}
