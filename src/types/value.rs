//! Value types for query results.

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

/// Value enum representing a single decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value.
    Null,
    /// BOOLEAN value.
    Boolean(bool),
    /// Any integer type (TINYINT through BIGINT).
    Int(i64),
    /// FLOAT or DOUBLE value.
    Double(f64),
    /// DECIMAL value as string (preserves precision).
    Decimal(String),
    /// String value (STRING, VARCHAR, CHAR).
    String(String),
    /// BINARY value.
    Binary(Bytes),
    /// DATE value.
    Date(NaiveDate),
    /// DATETIME or TIMESTAMP value (no timezone).
    Datetime(NaiveDateTime),
    /// ARRAY, MAP or STRUCT value as parsed JSON.
    Complex(serde_json::Value),
}

impl Value {
    /// Check if the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get the value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the value as a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to convert to i64.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to convert to f64.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get the value as a date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Datetime(dt) => Some(dt.date()),
            _ => None,
        }
    }

    /// Try to get the value as a date/time.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Datetime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Try to get the value as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Try to get the value as parsed JSON.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Complex(json) => Some(json),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Decimal(s) => write!(f, "{}", s),
            Value::String(s) => write!(f, "{}", s),
            Value::Binary(bytes) => write!(f, "<BINARY: {} bytes>", bytes.len()),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Datetime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Complex(json) => write!(f, "{}", json),
        }
    }
}
