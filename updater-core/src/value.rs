//! Values flowing through script evaluation.
//!
//! Booleans follow the script convention: any non-empty string is true, the
//! empty string is false. An absent value (`len() == -1`) is an operation
//! failure, not an abort.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Blob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Blob(Vec<u8>),
    Absent(ValueKind),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// `"t"` or `""`.
    pub fn bool(b: bool) -> Self {
        Value::String(if b { "t" } else { "" }.to_string())
    }

    pub fn empty() -> Self {
        Value::String(String::new())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Blob(_) => ValueKind::Blob,
            Value::Absent(kind) => *kind,
        }
    }

    /// Payload length in bytes, `-1` when absent.
    pub fn len(&self) -> i64 {
        match self {
            Value::String(s) => s.len() as i64,
            Value::Blob(b) => b.len() as i64,
            Value::Absent(_) => -1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent(_))
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Value::String(s) if !s.is_empty())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Raw payload of a string or blob.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s.as_bytes()),
            Value::Blob(b) => Some(b),
            Value::Absent(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
            Value::Absent(_) => f.write_str("(absent)"),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
