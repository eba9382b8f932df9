//! In-memory backend
//!
//! Evaluates structured statements against tables held in a [`DashMap`].
//! Join, filter and ordering semantics follow SQL: NULL never equals
//! anything, LEFT JOIN keeps unmatched rows, NULLs sort last.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;

use super::core::{Row, SqlDialect, StatementExecutor};
use crate::error::{OrmError, OrmResult};
use crate::statement::{ColumnRef, Condition, ConstraintOperator, JoinType, SelectStatement};
use crate::value::DatabaseValue;

type Record = HashMap<String, DatabaseValue>;

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Record>,
}

/// A row under evaluation: one optional record per alias
type Binding = HashMap<String, Option<Record>>;

/// Thread-safe in-memory table store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<String, MemoryTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a table with the given columns
    pub fn create_table<I, S>(&self, table: &str, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = columns.into_iter().map(Into::into).collect();
        self.tables.insert(
            table.to_string(),
            MemoryTable {
                columns,
                rows: Vec::new(),
            },
        );
    }

    /// Insert a row. Columns left out are stored as NULL.
    pub fn insert<I, S>(&self, table: &str, values: I) -> OrmResult<()>
    where
        I: IntoIterator<Item = (S, DatabaseValue)>,
        S: Into<String>,
    {
        let mut entry = self
            .tables
            .get_mut(table)
            .ok_or_else(|| OrmError::Database(format!("Table '{}' does not exist", table)))?;

        let mut record: Record = entry.columns.iter().map(|c| (c.clone(), DatabaseValue::Null)).collect();
        for (column, value) in values {
            let column = column.into();
            if !record.contains_key(&column) {
                return Err(OrmError::Database(format!(
                    "Column '{}' does not exist on table '{}'",
                    column, table
                )));
            }
            record.insert(column, value);
        }

        entry.rows.push(record);
        Ok(())
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    fn snapshot(&self, table: &str) -> OrmResult<MemoryTable> {
        self.tables
            .get(table)
            .map(|t| t.clone())
            .ok_or_else(|| OrmError::Database(format!("Table '{}' does not exist", table)))
    }

    /// Evaluate a statement synchronously
    pub fn evaluate(&self, statement: &SelectStatement) -> OrmResult<Vec<Row>> {
        let mut columns_by_alias: HashMap<String, Vec<String>> = HashMap::new();

        let base = self.snapshot(&statement.from.table)?;
        columns_by_alias.insert(statement.from.alias.clone(), base.columns.clone());
        let mut bindings: Vec<Binding> = base
            .rows
            .into_iter()
            .map(|record| HashMap::from([(statement.from.alias.clone(), Some(record))]))
            .collect();

        for join in &statement.joins {
            let joined = self.snapshot(&join.table.table)?;
            check_column(&columns_by_alias, &join.existing)?;
            if !joined.columns.contains(&join.joined.column) {
                return Err(unknown_column(&join.joined));
            }
            columns_by_alias.insert(join.table.alias.clone(), joined.columns.clone());

            let mut next = Vec::with_capacity(bindings.len());
            for binding in bindings {
                let existing = lookup(&binding, &join.existing);
                let matches: Vec<&Record> = joined
                    .rows
                    .iter()
                    .filter(|record| {
                        let candidate = record.get(&join.joined.column).unwrap_or(&DatabaseValue::Null);
                        existing.compare(candidate) == Some(Ordering::Equal)
                    })
                    .collect();

                if matches.is_empty() {
                    if join.join_type == JoinType::Left {
                        let mut extended = binding.clone();
                        extended.insert(join.table.alias.clone(), None);
                        next.push(extended);
                    }
                    continue;
                }

                for record in matches {
                    let mut extended = binding.clone();
                    extended.insert(join.table.alias.clone(), Some(record.clone()));
                    next.push(extended);
                }
            }
            bindings = next;
        }

        for condition in &statement.conditions {
            check_column(&columns_by_alias, &condition.column)?;
        }
        for column in statement.columns.iter().chain(statement.order_by.iter()) {
            check_column(&columns_by_alias, column)?;
        }

        let mut filtered = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let mut keep = true;
            for condition in &statement.conditions {
                if !evaluate_condition(&binding, condition)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                filtered.push(binding);
            }
        }

        filtered.sort_by(|a, b| {
            for column in &statement.order_by {
                let ordering = compare_nulls_last(&lookup(a, column), &lookup(b, column));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        Ok(filtered
            .iter()
            .map(|binding| {
                let mut row = Row::new();
                for column in &statement.columns {
                    row.insert(column.label(), lookup(binding, column));
                }
                row
            })
            .collect())
    }
}

#[async_trait]
impl StatementExecutor for MemoryStore {
    async fn fetch_all(&self, statement: &SelectStatement) -> OrmResult<Vec<Row>> {
        if tracing::enabled!(tracing::Level::TRACE) {
            let (sql, params) = statement.to_sql(&self.dialect());
            tracing::trace!(sql = %sql, params = params.len(), "evaluating statement in memory");
        }
        self.evaluate(statement)
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }
}

fn unknown_column(column: &ColumnRef) -> OrmError {
    OrmError::Database(format!("Column '{}' does not exist", column))
}

fn check_column(columns_by_alias: &HashMap<String, Vec<String>>, column: &ColumnRef) -> OrmResult<()> {
    match columns_by_alias.get(&column.alias) {
        Some(columns) if columns.contains(&column.column) => Ok(()),
        _ => Err(unknown_column(column)),
    }
}

fn lookup(binding: &Binding, column: &ColumnRef) -> DatabaseValue {
    binding
        .get(&column.alias)
        .and_then(|record| record.as_ref())
        .and_then(|record| record.get(&column.column))
        .cloned()
        .unwrap_or(DatabaseValue::Null)
}

fn compare_nulls_last(a: &DatabaseValue, b: &DatabaseValue) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

fn evaluate_condition(binding: &Binding, condition: &Condition) -> OrmResult<bool> {
    let value = lookup(binding, &condition.column);
    let operand = condition.values.first().unwrap_or(&DatabaseValue::Null);

    let result = match condition.operator {
        ConstraintOperator::IsNull => value.is_null(),
        ConstraintOperator::IsNotNull => !value.is_null(),
        ConstraintOperator::Equal => value.compare(operand) == Some(Ordering::Equal),
        ConstraintOperator::NotEqual => matches!(value.compare(operand), Some(o) if o != Ordering::Equal),
        ConstraintOperator::GreaterThan => value.compare(operand) == Some(Ordering::Greater),
        ConstraintOperator::LessThan => value.compare(operand) == Some(Ordering::Less),
        ConstraintOperator::GreaterThanOrEqual => {
            matches!(value.compare(operand), Some(Ordering::Greater | Ordering::Equal))
        }
        ConstraintOperator::LessThanOrEqual => {
            matches!(value.compare(operand), Some(Ordering::Less | Ordering::Equal))
        }
        ConstraintOperator::In => condition
            .values
            .iter()
            .any(|candidate| value.compare(candidate) == Some(Ordering::Equal)),
        ConstraintOperator::Like => match (&value, operand) {
            (DatabaseValue::String(text), DatabaseValue::String(pattern)) => like_regex(pattern)?.is_match(text),
            _ => false,
        },
    };

    Ok(result)
}

/// Translate a SQL LIKE pattern into an anchored regex
fn like_regex(pattern: &str) -> OrmResult<Regex> {
    let mut expression = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '%' => expression.push_str(".*"),
            '_' => expression.push('.'),
            other => expression.push_str(&regex::escape(&other.to_string())),
        }
    }
    expression.push('$');

    Regex::new(&expression).map_err(|e| OrmError::Query(format!("Invalid LIKE pattern '{}': {}", pattern, e)))
}
