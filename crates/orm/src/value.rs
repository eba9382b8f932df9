//! Column values and entity identity keys

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value as JsonValue;

/// Database value enumeration for type-safe parameter binding and row data
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Json(JsonValue),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Identity key for this value, if it can act as one.
    ///
    /// Integers of either width map to the same key so a `BIGINT` primary key
    /// matches an `INT` foreign key.
    pub fn as_key(&self) -> Option<KeyValue> {
        match self {
            DatabaseValue::Int32(i) => Some(KeyValue::Int(*i as i64)),
            DatabaseValue::Int64(i) => Some(KeyValue::Int(*i)),
            DatabaseValue::String(s) => Some(KeyValue::Text(s.clone())),
            DatabaseValue::Uuid(u) => Some(KeyValue::Uuid(*u)),
            _ => None,
        }
    }

    /// SQL-style comparison. `None` when either side is null or the types are
    /// not comparable.
    pub fn compare(&self, other: &DatabaseValue) -> Option<Ordering> {
        use DatabaseValue::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Uuid(a), Uuid(b)) => Some(a.cmp(b)),
            (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (Time(a), Time(b)) => Some(a.cmp(b)),
            (Bytes(a), Bytes(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            DatabaseValue::Int32(i) => Some(*i as f64),
            DatabaseValue::Int64(i) => Some(*i as f64),
            DatabaseValue::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int32(i) => JsonValue::from(*i),
            DatabaseValue::Int64(i) => JsonValue::from(*i),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::Bytes(b) => JsonValue::Array(b.iter().map(|&x| JsonValue::from(x)).collect()),
            DatabaseValue::Uuid(u) => JsonValue::String(u.to_string()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            DatabaseValue::Date(d) => JsonValue::String(d.to_string()),
            DatabaseValue::Time(t) => JsonValue::String(t.to_string()),
            DatabaseValue::Json(j) => j.clone(),
        }
    }
}

impl fmt::Display for DatabaseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseValue::Null => write!(f, "NULL"),
            DatabaseValue::String(s) => write!(f, "'{}'", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<uuid::Uuid> for DatabaseValue {
    fn from(value: uuid::Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DatabaseValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<chrono::NaiveDate> for DatabaseValue {
    fn from(value: chrono::NaiveDate) -> Self {
        DatabaseValue::Date(value)
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(value: Vec<u8>) -> Self {
        DatabaseValue::Bytes(value)
    }
}

impl From<chrono::NaiveTime> for DatabaseValue {
    fn from(value: chrono::NaiveTime) -> Self {
        DatabaseValue::Time(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::Json(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

impl From<KeyValue> for DatabaseValue {
    fn from(key: KeyValue) -> Self {
        match key {
            KeyValue::Int(i) => DatabaseValue::Int64(i),
            KeyValue::Text(s) => DatabaseValue::String(s),
            KeyValue::Uuid(u) => DatabaseValue::Uuid(u),
        }
    }
}

/// Hashable identity of an entity (primary key) or of a join column value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum KeyValue {
    Int(i64),
    Text(String),
    Uuid(uuid::Uuid),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(i) => write!(f, "{}", i),
            KeyValue::Text(s) => write!(f, "{}", s),
            KeyValue::Uuid(u) => write!(f, "{}", u),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Int(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Text(value.to_string())
    }
}
