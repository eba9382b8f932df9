//! Caller-supplied root filter

use super::types::{ColumnRef, Condition, ConstraintOperator};
use crate::error::{OrmError, OrmResult};
use crate::schema::EntityType;
use crate::value::DatabaseValue;

#[derive(Debug, Clone, PartialEq)]
struct Predicate {
    column: String,
    operator: ConstraintOperator,
    values: Vec<DatabaseValue>,
}

/// Predicates over the root entity's own columns, AND-ed together.
///
/// The filter narrows which roots are returned; it never filters the
/// contents of a fetched collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, column: &str, operator: ConstraintOperator, values: Vec<DatabaseValue>) -> Self {
        self.predicates.push(Predicate {
            column: column.to_string(),
            operator,
            values,
        });
        self
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.push(column, ConstraintOperator::Equal, vec![value.into()])
    }

    pub fn where_ne<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.push(column, ConstraintOperator::NotEqual, vec![value.into()])
    }

    pub fn where_gt<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.push(column, ConstraintOperator::GreaterThan, vec![value.into()])
    }

    pub fn where_gte<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.push(column, ConstraintOperator::GreaterThanOrEqual, vec![value.into()])
    }

    pub fn where_lt<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.push(column, ConstraintOperator::LessThan, vec![value.into()])
    }

    pub fn where_lte<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.push(column, ConstraintOperator::LessThanOrEqual, vec![value.into()])
    }

    /// Add WHERE condition with LIKE (`%` and `_` wildcards)
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.push(column, ConstraintOperator::Like, vec![pattern.into()])
    }

    pub fn where_in<T: Into<DatabaseValue>>(self, column: &str, values: Vec<T>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push(column, ConstraintOperator::In, values)
    }

    pub fn where_null(self, column: &str) -> Self {
        self.push(column, ConstraintOperator::IsNull, Vec::new())
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.push(column, ConstraintOperator::IsNotNull, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Check every predicate against the root entity type
    pub fn validate(&self, root: &EntityType) -> OrmResult<()> {
        for predicate in &self.predicates {
            if !root.has_column(&predicate.column) {
                return Err(OrmError::Query(format!(
                    "Filter column '{}' is not a column of '{}'",
                    predicate.column, root.name
                )));
            }

            if let Some(arity) = predicate.operator.arity() {
                if predicate.values.len() != arity {
                    return Err(OrmError::Query(format!(
                        "Operator {} on '{}' takes {} value(s), got {}",
                        predicate.operator.to_sql(),
                        predicate.column,
                        arity,
                        predicate.values.len()
                    )));
                }
            }

            if predicate.operator != ConstraintOperator::IsNull
                && predicate.operator != ConstraintOperator::IsNotNull
                && predicate.values.iter().any(DatabaseValue::is_null)
            {
                return Err(OrmError::Query(format!(
                    "Filter on '{}' compares against NULL; use where_null instead",
                    predicate.column
                )));
            }
        }
        Ok(())
    }

    /// Conditions against the table aliased as `alias`
    pub fn conditions(&self, alias: &str) -> Vec<Condition> {
        self.predicates
            .iter()
            .map(|p| Condition::new(ColumnRef::new(alias, p.column.clone()), p.operator, p.values.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn department() -> EntityType {
        EntityType::new("Department", "departments").columns(["name", "description"])
    }

    #[test]
    fn test_filter_builds_conditions_against_alias() {
        let filter = Filter::new().where_like("name", "%Science%").where_in("id", vec![1i64, 2, 3]);

        assert!(filter.validate(&department()).is_ok());
        let conditions = filter.conditions("t0");
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].column.label(), "t0.name");
        assert_eq!(conditions[1].operator, ConstraintOperator::In);
        assert_eq!(conditions[1].values.len(), 3);
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let filter = Filter::new().where_eq("budget", 100i64);
        let err = filter.validate(&department()).unwrap_err();
        assert!(matches!(err, OrmError::Query(ref msg) if msg.contains("budget")));
    }

    #[test]
    fn test_null_comparison_is_rejected() {
        let filter = Filter::new().where_eq("name", DatabaseValue::Null);
        assert!(filter.validate(&department()).is_err());

        let filter = Filter::new().where_null("description");
        assert!(filter.validate(&department()).is_ok());
    }
}
