//! Core Database Backend Traits
//!
//! A backend receives structured [`SelectStatement`]s and returns flat rows
//! keyed by column label (`alias.column`). SQL backends render the statement
//! for their dialect; the in-memory store evaluates it directly.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::{OrmError, OrmResult};
use crate::statement::{ColumnRef, SelectStatement};
use crate::value::DatabaseValue;

/// Executes one statement per call. Every call is one round trip.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute a statement and return the result rows
    async fn fetch_all(&self, statement: &SelectStatement) -> OrmResult<Vec<Row>>;

    /// SQL dialect statements are rendered in for this backend
    fn dialect(&self) -> SqlDialect;
}

#[async_trait]
impl<E: StatementExecutor + ?Sized> StatementExecutor for Arc<E> {
    async fn fetch_all(&self, statement: &SelectStatement) -> OrmResult<Vec<Row>> {
        (**self).fetch_all(statement).await
    }

    fn dialect(&self) -> SqlDialect {
        (**self).dialect()
    }
}

/// One result row, keyed by column label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, DatabaseValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: HashMap<String, DatabaseValue>) -> Self {
        Self { values }
    }

    pub fn insert(&mut self, label: impl Into<String>, value: DatabaseValue) {
        self.values.insert(label.into(), value);
    }

    /// Get a column value by label
    pub fn get_by_name(&self, label: &str) -> Option<&DatabaseValue> {
        self.values.get(label)
    }

    /// Get the value selected for `column`
    pub fn get(&self, column: &ColumnRef) -> OrmResult<&DatabaseValue> {
        let label = column.label();
        self.values
            .get(&label)
            .ok_or_else(|| OrmError::Database(format!("Column '{}' missing from result row", label)))
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    /// Column labels, sorted
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.keys().cloned().collect();
        names.sort();
        names
    }

    /// Convert row to JSON value
    pub fn to_json(&self) -> JsonValue {
        let map = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        JsonValue::Object(map)
    }
}

/// SQL dialect enumeration for database-specific SQL generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    #[default]
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder style for this dialect
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Get the quote character for identifiers in this dialect
    pub fn identifier_quote(&self) -> char {
        match self {
            SqlDialect::PostgreSQL => '"',
            SqlDialect::MySQL => '`',
            SqlDialect::SQLite => '"',
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::PostgreSQL => write!(f, "postgresql"),
            SqlDialect::MySQL => write!(f, "mysql"),
            SqlDialect::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for SqlDialect {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(SqlDialect::PostgreSQL),
            "mysql" => Ok(SqlDialect::MySQL),
            "sqlite" => Ok(SqlDialect::SQLite),
            _ => Err(OrmError::Configuration(format!("Unsupported SQL dialect: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("postgres".parse::<SqlDialect>().unwrap(), SqlDialect::PostgreSQL);
        assert_eq!("SQLite".parse::<SqlDialect>().unwrap(), SqlDialect::SQLite);
        assert!("oracle".parse::<SqlDialect>().is_err());
    }

    #[test]
    fn test_row_lookup_by_column() {
        let mut row = Row::new();
        row.insert("t0.id", DatabaseValue::Int64(7));

        assert_eq!(row.get(&ColumnRef::new("t0", "id")).unwrap(), &DatabaseValue::Int64(7));
        assert!(row.get(&ColumnRef::new("t1", "id")).is_err());
        assert_eq!(row.to_json()["t0.id"], 7);
    }
}
