//! Structured SELECT statements
//!
//! The loader never builds SQL strings directly. It builds a
//! [`SelectStatement`], which a SQL backend renders through
//! [`SelectStatement::to_sql`] and the memory store evaluates as-is.

pub mod filter;
pub mod sql_generation;
pub mod types;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use filter::Filter;
pub use types::{ColumnRef, Condition, ConstraintOperator, JoinClause, JoinType, TableRef};

/// Why a statement was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementPurpose {
    /// The statement that fetches the root rows and every path merged with them
    Primary,
    /// A follow-up statement scoped by the keys of already loaded parents
    Batch,
    /// Resolution of one deferred relationship on one entity
    Lazy,
}

impl fmt::Display for StatementPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementPurpose::Primary => write!(f, "primary"),
            StatementPurpose::Batch => write!(f, "batch"),
            StatementPurpose::Lazy => write!(f, "lazy"),
        }
    }
}

/// What a statement touches, without its parameter values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementShape {
    pub purpose: StatementPurpose,
    /// Tables in FROM/JOIN order
    pub tables: Vec<String>,
    pub join_count: usize,
    /// Number of keys in the `IN (...)` scope, if the statement has one
    pub scope_keys: Option<usize>,
}

impl fmt::Display for StatementShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] joins={}", self.purpose, self.tables.join(", "), self.join_count)?;
        if let Some(keys) = self.scope_keys {
            write!(f, " keys={}", keys)?;
        }
        Ok(())
    }
}

/// A SELECT over one table plus joins, with AND-ed conditions
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub purpose: StatementPurpose,
    pub from: TableRef,
    pub columns: Vec<ColumnRef>,
    pub joins: Vec<JoinClause>,
    pub conditions: Vec<Condition>,
    pub order_by: Vec<ColumnRef>,
}

impl SelectStatement {
    pub fn new(purpose: StatementPurpose, from: TableRef) -> Self {
        Self {
            purpose,
            from,
            columns: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
        }
    }

    pub fn select(&mut self, column: ColumnRef) {
        if !self.columns.contains(&column) {
            self.columns.push(column);
        }
    }

    pub fn join(&mut self, join: JoinClause) {
        self.joins.push(join);
    }

    pub fn condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn order_by(&mut self, column: ColumnRef) {
        if !self.order_by.contains(&column) {
            self.order_by.push(column);
        }
    }

    /// Tables touched, FROM first then joins in order
    pub fn tables(&self) -> Vec<String> {
        std::iter::once(self.from.table.clone())
            .chain(self.joins.iter().map(|j| j.table.table.clone()))
            .collect()
    }

    pub fn shape(&self) -> StatementShape {
        let scope_keys = self
            .conditions
            .iter()
            .find(|c| c.operator == ConstraintOperator::In)
            .map(|c| c.values.len());

        StatementShape {
            purpose: self.purpose,
            tables: self.tables(),
            join_count: self.joins.len(),
            scope_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DatabaseValue;

    #[test]
    fn test_shape_reports_tables_and_scope() {
        let mut statement = SelectStatement::new(StatementPurpose::Batch, TableRef::new("courses", "t0"));
        statement.select(ColumnRef::new("t0", "id"));
        statement.join(JoinClause {
            join_type: JoinType::Left,
            table: TableRef::new("reviews", "t1"),
            joined: ColumnRef::new("t1", "course_id"),
            existing: ColumnRef::new("t0", "id"),
        });
        statement.condition(Condition::new(
            ColumnRef::new("t0", "department_id"),
            ConstraintOperator::In,
            vec![DatabaseValue::Int64(1), DatabaseValue::Int64(2)],
        ));

        let shape = statement.shape();
        assert_eq!(shape.tables, vec!["courses", "reviews"]);
        assert_eq!(shape.join_count, 1);
        assert_eq!(shape.scope_keys, Some(2));
        assert_eq!(shape.to_string(), "batch [courses, reviews] joins=1 keys=2");
    }

    #[test]
    fn test_select_ignores_duplicate_columns() {
        let mut statement = SelectStatement::new(StatementPurpose::Primary, TableRef::new("departments", "t0"));
        statement.select(ColumnRef::new("t0", "id"));
        statement.select(ColumnRef::new("t0", "id"));
        assert_eq!(statement.columns.len(), 1);
        assert_eq!(statement.shape().scope_keys, None);
    }
}
