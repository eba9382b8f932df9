//! SQL text generation for structured statements

use super::types::{ColumnRef, Condition, ConstraintOperator};
use super::SelectStatement;
use crate::backends::SqlDialect;
use crate::value::DatabaseValue;

impl SelectStatement {
    /// Generate SQL with parameter placeholders and return the parameters in
    /// binding order
    pub fn to_sql(&self, dialect: &SqlDialect) -> (String, Vec<DatabaseValue>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} AS {}", qualified(dialect, c), quote(dialect, &c.label())))
            .collect();
        sql.push_str(&columns.join(", "));

        sql.push_str(" FROM ");
        sql.push_str(&format!(
            "{} AS {}",
            quote(dialect, &self.from.table),
            quote(dialect, &self.from.alias)
        ));

        for join in &self.joins {
            sql.push_str(&format!(
                " {} {} AS {} ON {} = {}",
                join.join_type,
                quote(dialect, &join.table.table),
                quote(dialect, &join.table.alias),
                qualified(dialect, &join.joined),
                qualified(dialect, &join.existing),
            ));
        }

        if !self.conditions.is_empty() {
            let predicates: Vec<String> = self
                .conditions
                .iter()
                .map(|c| render_condition(dialect, c, &mut params))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }

        if !self.order_by.is_empty() {
            let order: Vec<String> = self.order_by.iter().map(|c| qualified(dialect, c)).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        (sql, params)
    }
}

fn quote(dialect: &SqlDialect, identifier: &str) -> String {
    let q = dialect.identifier_quote();
    format!("{q}{identifier}{q}")
}

fn qualified(dialect: &SqlDialect, column: &ColumnRef) -> String {
    format!("{}.{}", quote(dialect, &column.alias), quote(dialect, &column.column))
}

fn render_condition(dialect: &SqlDialect, condition: &Condition, params: &mut Vec<DatabaseValue>) -> String {
    let column = qualified(dialect, &condition.column);

    match condition.operator {
        ConstraintOperator::IsNull | ConstraintOperator::IsNotNull => {
            format!("{} {}", column, condition.operator.to_sql())
        }
        ConstraintOperator::In => {
            if condition.values.is_empty() {
                // IN () is not valid SQL; an empty set matches nothing
                return "1 = 0".to_string();
            }
            let placeholders: Vec<String> = condition
                .values
                .iter()
                .map(|value| {
                    params.push(value.clone());
                    dialect.parameter_placeholder(params.len() - 1)
                })
                .collect();
            format!("{} IN ({})", column, placeholders.join(", "))
        }
        operator => {
            let value = condition.values.first().cloned().unwrap_or(DatabaseValue::Null);
            params.push(value);
            format!(
                "{} {} {}",
                column,
                operator.to_sql(),
                dialect.parameter_placeholder(params.len() - 1)
            )
        }
    }
}
