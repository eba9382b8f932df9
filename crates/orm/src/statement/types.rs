//! Statement building blocks

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::DatabaseValue;

/// A table with the alias it is referenced by inside one statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub table: String,
    pub alias: String,
}

impl TableRef {
    pub fn new(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
        }
    }
}

/// `alias.column`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }

    /// Name the column carries in result rows
    pub fn label(&self) -> String {
        format!("{}.{}", self.alias, self.column)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alias, self.column)
    }
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
        }
    }
}

/// Join clause: `<join_type> table AS alias ON joined = existing`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: TableRef,
    /// Column of the newly joined table
    pub joined: ColumnRef,
    /// Column of a table already in the statement
    pub existing: ColumnRef,
}

/// Condition operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintOperator {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    In,
    Like,
    IsNull,
    IsNotNull,
}

impl ConstraintOperator {
    /// Convert the operator to its SQL representation
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThanOrEqual => "<=",
            Self::In => "IN",
            Self::Like => "LIKE",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Number of bound values the operator takes; `None` for a list
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::IsNull | Self::IsNotNull => Some(0),
            Self::In => None,
            _ => Some(1),
        }
    }
}

/// A single `WHERE` predicate; all predicates of a statement are `AND`ed
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: ColumnRef,
    pub operator: ConstraintOperator,
    pub values: Vec<DatabaseValue>,
}

impl Condition {
    pub fn new(column: ColumnRef, operator: ConstraintOperator, values: Vec<DatabaseValue>) -> Self {
        Self {
            column,
            operator,
            values,
        }
    }
}
