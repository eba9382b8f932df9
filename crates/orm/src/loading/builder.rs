//! Statement construction for merge groups

use std::collections::HashMap;

use super::plan::{FetchPlan, MergeGroup};
use crate::backends::SqlDialect;
use crate::error::{OrmError, OrmResult};
use crate::schema::{EntityType, RelationshipMetadata, RelationshipType, Schema};
use crate::statement::{
    ColumnRef, Condition, ConstraintOperator, Filter, JoinClause, JoinType, SelectStatement, StatementPurpose,
    TableRef,
};
use crate::value::DatabaseValue;

/// Where each node of a group lives inside its statement
#[derive(Debug, Clone, Default)]
pub(crate) struct GroupLayout {
    aliases: HashMap<usize, String>,
    /// For secondary groups: the column holding the owning parent's join value
    owner_column: Option<ColumnRef>,
}

impl GroupLayout {
    pub(crate) fn alias(&self, node: usize) -> OrmResult<&str> {
        self.aliases
            .get(&node)
            .map(String::as_str)
            .ok_or_else(|| OrmError::AmbiguousMerge(format!("node {} has no table alias", node)))
    }

    pub(crate) fn owner_column(&self) -> Option<&ColumnRef> {
        self.owner_column.as_ref()
    }
}

pub(crate) struct StatementBuilder<'a> {
    schema: &'a Schema,
    plan: &'a FetchPlan,
    next_alias: usize,
}

impl<'a> StatementBuilder<'a> {
    pub(crate) fn new(schema: &'a Schema, plan: &'a FetchPlan) -> Self {
        Self {
            schema,
            plan,
            next_alias: 0,
        }
    }

    fn alias(&mut self) -> String {
        let alias = format!("t{}", self.next_alias);
        self.next_alias += 1;
        alias
    }

    /// Statement for the root group: root rows LEFT JOINed with every merged
    /// path, filtered by the caller's filter
    pub(crate) fn primary(&mut self, filter: Option<&Filter>) -> OrmResult<(SelectStatement, GroupLayout)> {
        self.next_alias = 0;
        let group = &self.plan.groups[0];
        let root = self.plan.root();
        let root_type = self.schema.entity(&root.entity_type)?;

        let alias = self.alias();
        let mut statement = SelectStatement::new(StatementPurpose::Primary, TableRef::new(&root.table, &alias));
        select_entity(&mut statement, root_type, &alias);

        let mut layout = GroupLayout::default();
        layout.aliases.insert(root.id, alias.clone());

        if let Some(filter) = filter {
            for condition in filter.conditions(&alias) {
                statement.condition(condition);
            }
        }

        self.join_members(&mut statement, &mut layout, group)?;
        Ok((statement, layout))
    }

    /// Statement for a secondary group, scoped to the given parent join values
    pub(crate) fn secondary(
        &mut self,
        group: &MergeGroup,
        keys: Vec<DatabaseValue>,
        purpose: StatementPurpose,
    ) -> OrmResult<(SelectStatement, GroupLayout)> {
        self.next_alias = 0;
        let anchor = self.plan.node(group.anchor);
        let relationship = anchor
            .relationship
            .as_ref()
            .ok_or_else(|| OrmError::AmbiguousMerge("secondary group anchored at the root".to_string()))?;
        let target = self.schema.entity(&anchor.entity_type)?;

        let mut layout = GroupLayout::default();
        let (mut statement, owner) = match relationship.relationship_type {
            RelationshipType::HasOne | RelationshipType::HasMany => {
                let alias = self.alias();
                let statement = SelectStatement::new(purpose, TableRef::new(&target.table, &alias));
                layout.aliases.insert(anchor.id, alias.clone());
                (statement, ColumnRef::new(alias, &relationship.foreign_key))
            }
            RelationshipType::BelongsTo => {
                let alias = self.alias();
                let statement = SelectStatement::new(purpose, TableRef::new(&target.table, &alias));
                layout.aliases.insert(anchor.id, alias.clone());
                (statement, ColumnRef::new(alias, &relationship.referenced_key))
            }
            RelationshipType::ManyToMany => {
                let pivot = pivot_of(relationship)?;
                let pivot_alias = self.alias();
                let alias = self.alias();
                let mut statement = SelectStatement::new(purpose, TableRef::new(&pivot.table, &pivot_alias));
                statement.join(JoinClause {
                    join_type: JoinType::Inner,
                    table: TableRef::new(&target.table, &alias),
                    joined: ColumnRef::new(&alias, &target.primary_key),
                    existing: ColumnRef::new(&pivot_alias, &pivot.foreign_key),
                });
                layout.aliases.insert(anchor.id, alias);
                (statement, ColumnRef::new(pivot_alias, &pivot.local_key))
            }
        };

        statement.select(owner.clone());
        statement.order_by(owner.clone());
        select_entity(&mut statement, target, layout.alias(anchor.id)?);
        statement.condition(Condition::new(owner.clone(), ConstraintOperator::In, keys));
        layout.owner_column = Some(owner);

        self.join_members(&mut statement, &mut layout, group)?;
        Ok((statement, layout))
    }

    /// LEFT JOIN every non-anchor member of the group onto its parent
    fn join_members(
        &mut self,
        statement: &mut SelectStatement,
        layout: &mut GroupLayout,
        group: &MergeGroup,
    ) -> OrmResult<()> {
        let anchor = self.plan.node(group.anchor);
        statement.order_by(ColumnRef::new(layout.alias(anchor.id)?, &anchor.primary_key));

        for &id in group.nodes.iter().filter(|&&id| id != group.anchor) {
            let node = self.plan.node(id);
            let parent = node
                .parent
                .ok_or_else(|| OrmError::AmbiguousMerge(format!("node '{}' has no parent", node.path)))?;
            let parent_alias = layout.alias(parent)?.to_string();
            let relationship = node
                .relationship
                .as_ref()
                .ok_or_else(|| OrmError::AmbiguousMerge(format!("node '{}' has no relationship", node.path)))?;
            let target = self.schema.entity(&node.entity_type)?;
            let alias = self.alias();

            match relationship.relationship_type {
                RelationshipType::HasOne | RelationshipType::HasMany => statement.join(JoinClause {
                    join_type: JoinType::Left,
                    table: TableRef::new(&target.table, &alias),
                    joined: ColumnRef::new(&alias, &relationship.foreign_key),
                    existing: ColumnRef::new(&parent_alias, &relationship.referenced_key),
                }),
                RelationshipType::BelongsTo => statement.join(JoinClause {
                    join_type: JoinType::Left,
                    table: TableRef::new(&target.table, &alias),
                    joined: ColumnRef::new(&alias, &relationship.referenced_key),
                    existing: ColumnRef::new(&parent_alias, &relationship.foreign_key),
                }),
                RelationshipType::ManyToMany => {
                    let pivot = pivot_of(relationship)?;
                    let pivot_alias = alias;
                    let alias = self.alias();
                    statement.join(JoinClause {
                        join_type: JoinType::Left,
                        table: TableRef::new(&pivot.table, &pivot_alias),
                        joined: ColumnRef::new(&pivot_alias, &pivot.local_key),
                        existing: ColumnRef::new(&parent_alias, &relationship.referenced_key),
                    });
                    statement.join(JoinClause {
                        join_type: JoinType::Left,
                        table: TableRef::new(&target.table, &alias),
                        joined: ColumnRef::new(&alias, &target.primary_key),
                        existing: ColumnRef::new(&pivot_alias, &pivot.foreign_key),
                    });
                    select_entity(statement, target, &alias);
                    statement.order_by(ColumnRef::new(&alias, &target.primary_key));
                    layout.aliases.insert(id, alias);
                    continue;
                }
            }

            select_entity(statement, target, &alias);
            statement.order_by(ColumnRef::new(&alias, &target.primary_key));
            layout.aliases.insert(id, alias);
        }

        Ok(())
    }
}

fn select_entity(statement: &mut SelectStatement, entity: &EntityType, alias: &str) {
    for column in &entity.columns {
        statement.select(ColumnRef::new(alias, column));
    }
}

fn pivot_of(relationship: &RelationshipMetadata) -> OrmResult<&crate::schema::PivotConfig> {
    relationship.pivot_config.as_ref().ok_or_else(|| {
        OrmError::Configuration(format!(
            "Many-to-many relationship '{}' has no pivot configuration",
            relationship.name
        ))
    })
}

impl FetchPlan {
    /// Render each merge group as SQL. Secondary groups show a single key
    /// placeholder standing for the parent keys collected at run time.
    pub fn explain(&self, schema: &Schema, filter: Option<&Filter>, dialect: SqlDialect) -> OrmResult<Vec<String>> {
        let mut builder = StatementBuilder::new(schema, self);
        let mut rendered = Vec::with_capacity(self.groups.len());

        for group in &self.groups {
            let (statement, _) = if group.is_primary() {
                builder.primary(filter)?
            } else {
                builder.secondary(group, vec![DatabaseValue::Null], StatementPurpose::Batch)?
            };
            rendered.push(statement.to_sql(&dialect).0);
        }

        Ok(rendered)
    }
}
