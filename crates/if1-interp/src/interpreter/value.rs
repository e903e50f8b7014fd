//! Runtime value representation for the interpreter.
//!
//! [`Value`] is the dynamic counterpart of the IF1 basic types. Strings are
//! arrays of characters, and a function reference is the [`NodeId`] of a
//! top-level function graph of the module being interpreted.

use std::fmt;

use if1_core::{BasicKind, NodeId};
use serde::{Deserialize, Serialize};

/// A runtime value produced or consumed by node evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Char(char),
    Int(i64),
    /// Single precision, the IF1 `real`.
    Real(f32),
    /// Double precision, the IF1 `doublereal`.
    Double(f64),
    Null,
    Array(Vec<Value>),
    Function(NodeId),
}

impl Value {
    /// A string as an array of characters.
    pub fn string(s: &str) -> Value {
        Value::Array(s.chars().map(Value::Char).collect())
    }

    /// The text of an array of characters.
    pub fn as_string(&self) -> Option<String> {
        let Value::Array(items) = self else {
            return None;
        };
        items
            .iter()
            .map(|v| match v {
                Value::Char(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    /// Truth value used by conditionals, loops and the logical operators.
    ///
    /// Zero, `'\0'`, null and the empty array are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Char(c) => *c != '\0',
            Value::Int(n) => *n != 0,
            Value::Real(x) => *x != 0.0,
            Value::Double(x) => *x != 0.0,
            Value::Null => false,
            Value::Array(items) => !items.is_empty(),
            Value::Function(_) => true,
        }
    }

    /// The basic kind of a scalar value.
    pub fn basic_kind(&self) -> Option<BasicKind> {
        match self {
            Value::Bool(_) => Some(BasicKind::Boolean),
            Value::Char(_) => Some(BasicKind::Character),
            Value::Int(_) => Some(BasicKind::Integer),
            Value::Real(_) => Some(BasicKind::Real),
            Value::Double(_) => Some(BasicKind::DoubleReal),
            Value::Null => Some(BasicKind::Null),
            Value::Array(_) | Value::Function(_) => None,
        }
    }

    /// Returns a human-readable description of the value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Array(_) => "array",
            Value::Function(_) => "function",
            other => other.basic_kind().map_or("unknown", BasicKind::name),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::Int(n) => write!(f, "{}", n),
            Value::Real(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
            Value::Null => f.write_str("null"),
            Value::Array(items) => {
                if let Some(s) = self.as_string() {
                    return write!(f, "{:?}", s);
                }
                f.write_str("[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
            Value::Function(id) => write!(f, "function {}", id),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Real(x)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}
