//! Node types for the Document Value Tree

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A node in the value tree
///
/// Objects keep insertion order: when no target schema is available the
/// serializer falls back to declaration order, so key order is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null/absent value
    Null,

    /// Boolean value
    Bool(bool),

    /// Numeric value
    Number(f64),

    /// String value (dates travel as strings until formatting)
    String(String),

    /// Ordered list of nodes (cardinality > 1)
    List(Vec<Value>),

    /// Object node mapping field name to child node
    Object(IndexMap<String, Value>),
}

impl Value {
    /// Create an empty object node
    pub fn object() -> Self {
        Value::Object(IndexMap::new())
    }

    /// Create a string node
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if value is null or an empty string
    ///
    /// `0` and `false` are not empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Stringify a scalar value
    ///
    /// Integral numbers print without a fractional part. Lists and objects
    /// have no string form and return `None`.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(format_number(*n)),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::List(_) | Value::Object(_) => None,
        }
    }

    /// Coerce a scalar to a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null | Value::List(_) | Value::Object(_) => None,
        }
    }

    /// Borrow the elements if this is a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the fields if this is an object
    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Look up a direct child field of an object node
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|fields| fields.get(name))
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

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Print a number without a trailing `.0` when it is integral
#[allow(clippy::cast_possible_truncation)]
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_string_scalars() {
        assert_eq!(Value::string("x").as_string().unwrap(), "x");
        assert_eq!(Value::Number(42.0).as_string().unwrap(), "42");
        assert_eq!(Value::Number(1.5).as_string().unwrap(), "1.5");
        assert_eq!(Value::Bool(true).as_string().unwrap(), "true");
        assert_eq!(Value::Null.as_string(), None);
    }

    #[test]
    fn test_is_empty_semantics() {
        assert!(Value::Null.is_empty());
        assert!(Value::string("").is_empty());
        assert!(!Value::Number(0.0).is_empty());
        assert!(!Value::Bool(false).is_empty());
        assert!(!Value::string("x").is_empty());
    }

    #[test]
    fn test_as_f64_coercion() {
        assert_eq!(Value::Number(3.5).as_f64(), Some(3.5));
        assert_eq!(Value::string(" 12 ").as_f64(), Some(12.0));
        assert_eq!(Value::string("abc").as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn test_object_preserves_insertion_order() {
        let mut fields = IndexMap::new();
        fields.insert("B".to_string(), Value::string("1"));
        fields.insert("A".to_string(), Value::string("2"));
        fields.insert("C".to_string(), Value::string("3"));
        let obj = Value::Object(fields);
        let keys: Vec<&String> = obj.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["B", "A", "C"]);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut fields = IndexMap::new();
        fields.insert("n".to_string(), Value::Number(1.0));
        fields.insert(
            "items".to_string(),
            Value::List(vec![Value::string("a"), Value::Null]),
        );
        let value = Value::Object(fields);
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, back);
    }
}
