//! The typed value model shared by the schema engine and the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One on-disk row: identifier at position 0, decimal version at position 1,
/// schema-defined cells after that.
pub type Row = Vec<String>;

/// The in-memory, schema-typed view of one row.
///
/// A `BTreeMap` keeps field iteration (and therefore JSON output) stable.
pub type Resource = BTreeMap<String, Value>;

/// A typed field value.
///
/// Untagged so that JSON numbers, strings and string arrays map onto the
/// three shapes directly, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl Value {
    /// Numeric payload, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text payload, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// List payload, if this is a list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Value {
        Value::List(items)
    }
}

impl From<&[&str]> for Value {
    fn from(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| s.to_string()).collect())
    }
}
