//! Row absorption and graph assembly
//!
//! Rows of every statement are absorbed into per-node record maps keyed by
//! primary key, which collapses the duplicates a to-many join produces.
//! Parent/child links are keyed by the parent's join value. The entity graph
//! is built once, after every statement of the plan has returned.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::builder::GroupLayout;
use super::plan::{FetchPlan, MergeGroup};
use crate::backends::Row;
use crate::error::OrmResult;
use crate::relationships::{Entity, LazyHandle, Related, Relation};
use crate::schema::{Cardinality, Schema};
use crate::statement::ColumnRef;
use crate::value::{DatabaseValue, KeyValue};

type Record = BTreeMap<String, DatabaseValue>;

#[derive(Debug, Default)]
struct NodeState {
    records: HashMap<KeyValue, Record>,
    /// Parent join value -> child keys in arrival order
    links: HashMap<KeyValue, Vec<KeyValue>>,
    seen: HashSet<(KeyValue, KeyValue)>,
}

#[derive(Debug)]
pub(crate) struct LoadState {
    nodes: Vec<NodeState>,
    roots: Vec<KeyValue>,
    seen_roots: HashSet<KeyValue>,
}

impl LoadState {
    pub(crate) fn new(plan: &FetchPlan) -> Self {
        Self {
            nodes: plan.nodes().iter().map(|_| NodeState::default()).collect(),
            roots: Vec::new(),
            seen_roots: HashSet::new(),
        }
    }

    /// Absorb the rows of one group's statement
    pub(crate) fn absorb(
        &mut self,
        schema: &Schema,
        plan: &FetchPlan,
        group: &MergeGroup,
        layout: &GroupLayout,
        rows: &[Row],
    ) -> OrmResult<()> {
        for row in rows {
            for &id in &group.nodes {
                let node = plan.node(id);
                let alias = layout.alias(id)?;
                let entity = schema.entity(&node.entity_type)?;

                // NULL key: the LEFT JOIN found nothing for this node
                let Some(key) = row.get(&ColumnRef::new(alias, &node.primary_key))?.as_key() else {
                    continue;
                };

                let state = &mut self.nodes[id];
                if !state.records.contains_key(&key) {
                    let mut record = Record::new();
                    for column in &entity.columns {
                        record.insert(column.clone(), row.get(&ColumnRef::new(alias, column))?.clone());
                    }
                    state.records.insert(key.clone(), record);
                }

                let parent_value = match (node.parent, node.relationship.as_ref()) {
                    (None, _) | (_, None) => {
                        if self.seen_roots.insert(key.clone()) {
                            self.roots.push(key);
                        }
                        continue;
                    }
                    (Some(_), Some(_)) if id == group.anchor => match layout.owner_column() {
                        Some(owner) => row.get(owner)?.as_key(),
                        None => None,
                    },
                    (Some(parent), Some(relationship)) => row
                        .get(&ColumnRef::new(layout.alias(parent)?, relationship.local_join_column()))?
                        .as_key(),
                };

                if let Some(parent_value) = parent_value {
                    let state = &mut self.nodes[id];
                    if state.seen.insert((parent_value.clone(), key.clone())) {
                        state.links.entry(parent_value).or_default().push(key);
                    }
                }
            }
        }
        Ok(())
    }

    /// Distinct non-null join values of `node`'s parent records for the
    /// relationship leading to `node`, in key order
    pub(crate) fn parent_keys(&self, plan: &FetchPlan, node: usize) -> Vec<KeyValue> {
        let child = plan.node(node);
        let (Some(parent), Some(relationship)) = (child.parent, child.relationship.as_ref()) else {
            return Vec::new();
        };
        let column = relationship.local_join_column();

        self.nodes[parent]
            .records
            .values()
            .filter_map(|record| record.get(column).and_then(DatabaseValue::as_key))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub(crate) fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Build the root entities
    pub(crate) fn assemble(&self, schema: &Schema, plan: &FetchPlan) -> OrmResult<Vec<Entity>> {
        self.roots
            .iter()
            .filter_map(|key| self.build(schema, plan, 0, key).transpose())
            .collect()
    }

    /// Related entities of `node` linked to the parent join value
    pub(crate) fn related(
        &self,
        schema: &Schema,
        plan: &FetchPlan,
        node: usize,
        join_value: Option<&KeyValue>,
    ) -> OrmResult<Related> {
        let keys = join_value
            .and_then(|value| self.nodes[node].links.get(value))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut entities = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entity) = self.build(schema, plan, node, key)? {
                entities.push(entity);
            }
        }

        let cardinality = plan
            .node(node)
            .relationship
            .as_ref()
            .map(|r| r.cardinality())
            .unwrap_or(Cardinality::ToMany);

        Ok(match cardinality {
            Cardinality::ToMany => Related::Many(entities),
            Cardinality::ToOne => Related::One(entities.into_iter().next().map(Box::new)),
        })
    }

    fn build(&self, schema: &Schema, plan: &FetchPlan, node: usize, key: &KeyValue) -> OrmResult<Option<Entity>> {
        let Some(record) = self.nodes[node].records.get(key) else {
            return Ok(None);
        };
        let plan_node = plan.node(node);
        let entity_type = schema.entity(&plan_node.entity_type)?;
        let mut entity = Entity::new(&entity_type.name, key.clone(), record.clone());

        for relationship in &entity_type.relationships {
            let join_value = record.get(relationship.local_join_column()).and_then(DatabaseValue::as_key);

            let relation = match plan.child(node, &relationship.name) {
                Some(child) => Relation::Loaded(self.related(schema, plan, child.id, join_value.as_ref())?),
                None => Relation::Deferred(LazyHandle {
                    owner_type: entity_type.name.clone(),
                    relationship: relationship.name.clone(),
                    join_value,
                }),
            };
            entity.set_relation(&relationship.name, relation);
        }

        Ok(Some(entity))
    }
}
