//! Argument value types for deferred calls.
//!
//! Deferred calls carry their arguments as data rather than as Rust call
//! expressions, so the argument model mirrors a dynamic call site: an
//! ordered list of positional values plus named keyword values. The type
//! system uses an enum-based approach:
//! - Closed set of types: capability arguments are numbers, strings and flags
//! - Zero-cost pattern matching: the compiler optimizes to jump tables
//! - Serialization: serde handles enums natively, so registered pipelines
//!   can be persisted and inspected

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single argument value passed to a deferred call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// 64-bit floating point number
    Float(f64),
    /// 64-bit signed integer
    Integer(i64),
    /// UTF-8 string
    String(String),
    /// Boolean value
    Boolean(bool),
    /// Represents absence of value
    None,
}

impl Value {
    /// Get this value as a float. Integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get this value as an integer.
    pub fn as_integer(&self) -> Option<i64> {
        if let Value::Integer(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    /// Get this value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        if let Value::String(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    /// Get this value as a boolean.
    pub fn as_boolean(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    /// Check whether this is the `None` value.
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::None => write!(f, "none"),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::None,
        }
    }
}

/// The recorded arguments of a deferred call: positional values in call
/// order plus keyword values in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: IndexMap<String, Value>,
}

impl CallArgs {
    /// Create an empty argument record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Insert a keyword argument. Re-inserting a name replaces its value.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// All positional arguments in call order.
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// All keyword arguments in insertion order.
    pub fn keyword(&self) -> &IndexMap<String, Value> {
        &self.keyword
    }

    /// Check whether no arguments were recorded.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Get a positional argument by index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Get a keyword argument by name.
    pub fn get_kwarg(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    // ========================================================================
    // Typed getters for capability implementations
    // ========================================================================

    /// Get a positional argument as a float.
    pub fn float_at(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(Value::as_float)
    }

    /// Get a positional argument as a string slice.
    pub fn str_at(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(Value::as_str)
    }

    /// Get a keyword argument as a float.
    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get_kwarg(name).and_then(Value::as_float)
    }

    /// Get a keyword argument as an integer.
    pub fn get_integer(&self, name: &str) -> Option<i64> {
        self.get_kwarg(name).and_then(Value::as_integer)
    }

    /// Get a keyword argument as a string slice.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get_kwarg(name).and_then(Value::as_str)
    }

    /// Get a keyword argument as a boolean.
    pub fn get_boolean(&self, name: &str) -> Option<bool> {
        self.get_kwarg(name).and_then(Value::as_boolean)
    }
}

impl fmt::Display for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.positional.iter().map(|v| v.to_string()).collect();
        parts.extend(self.keyword.iter().map(|(k, v)| format!("{k}={v}")));
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_coercion() {
        assert_eq!(Value::Float(2.5).as_float(), Some(2.5));
        assert_eq!(Value::Integer(3).as_float(), Some(3.0));
        assert_eq!(Value::String("x".into()).as_float(), None);
        assert_eq!(Value::from(Some(1.0)), Value::Float(1.0));
        assert_eq!(Value::from(None::<f64>), Value::None);
    }

    #[test]
    fn test_call_args_ordering() {
        let args = CallArgs::new()
            .arg(1.0)
            .arg("lowpass")
            .kwarg("cutoff", 10.0)
            .kwarg("axis", "y");

        assert_eq!(args.positional().len(), 2);
        assert_eq!(args.float_at(0), Some(1.0));
        assert_eq!(args.str_at(1), Some("lowpass"));

        let names: Vec<_> = args.keyword().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["cutoff", "axis"]);
    }

    #[test]
    fn test_typed_kwarg_getters() {
        let args = CallArgs::new()
            .kwarg("n", 3i64)
            .kwarg("method", "median")
            .kwarg("strict", true);

        assert_eq!(args.get_integer("n"), Some(3));
        assert_eq!(args.get_float("n"), Some(3.0));
        assert_eq!(args.get_str("method"), Some("median"));
        assert_eq!(args.get_boolean("strict"), Some(true));
        assert_eq!(args.get_float("missing"), None);
    }

    #[test]
    fn test_display() {
        let args = CallArgs::new().arg(2.0).kwarg("axis", "y");
        assert_eq!(args.to_string(), "2, axis=y");
    }
}
