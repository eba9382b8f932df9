//! Fetch planner
//!
//! Builds the relationship tree for a root type and a set of paths, then
//! partitions it into merge groups. A group holds at most one chain of
//! to-many edges, so no statement ever returns a cross product of sibling
//! collections.

use crate::config::LoaderConfig;
use crate::error::{OrmError, OrmResult};
use crate::path::RelationshipPath;
use crate::schema::{EntityType, RelationshipMetadata, Schema};

use super::plan::{FetchMode, FetchPlan, MergeGroup, NodeOrigin, PlanNode};

pub struct FetchPlanner<'a> {
    schema: &'a Schema,
    config: &'a LoaderConfig,
}

impl<'a> FetchPlanner<'a> {
    pub fn new(schema: &'a Schema, config: &'a LoaderConfig) -> Self {
        Self { schema, config }
    }

    /// Plan a load of `root` with the given relationship paths.
    ///
    /// Every path is validated before anything else happens; the first
    /// unresolvable segment fails the whole plan.
    pub fn plan<P: AsRef<str>>(&self, root: &str, paths: &[P], mode: FetchMode) -> OrmResult<FetchPlan> {
        let root_type = self.schema.entity(root)?;
        let mut nodes = vec![root_node(root_type)];

        for raw in paths {
            let path = RelationshipPath::parse(raw.as_ref());
            let steps = path.resolve(self.schema, root)?;
            if steps.len() > self.config.max_depth {
                return Err(OrmError::Query(format!(
                    "Relationship path '{}' is {} levels deep, max_depth is {}",
                    path,
                    steps.len(),
                    self.config.max_depth
                )));
            }

            let mut current = 0;
            for relationship in steps {
                current = match find_child(&nodes, current, &relationship.name) {
                    Some(existing) => existing,
                    None => self.add_child(&mut nodes, current, relationship, NodeOrigin::Requested)?,
                };
            }
        }

        if mode == FetchMode::Load {
            self.expand_defaults(&mut nodes, 0)?;
        }

        let plan = partition(root, mode, nodes);
        plan.verify()?;

        tracing::debug!(
            root = %root,
            mode = %mode,
            paths = ?plan.paths(),
            statements = plan.statement_count(),
            "fetch plan built"
        );

        Ok(plan)
    }

    /// Plan the load of one relationship of `owner`, used to resolve a
    /// deferred handle. Group 1 holds the related rows; the owner is not
    /// fetched again.
    pub fn plan_relationship(&self, owner: &str, relationship: &str) -> OrmResult<FetchPlan> {
        let owner_type = self.schema.entity(owner)?;
        let metadata = self.schema.relationship(owner, relationship)?;

        let mut nodes = vec![root_node(owner_type)];
        let child = self.add_child(&mut nodes, 0, metadata, NodeOrigin::Requested)?;

        let plan = FetchPlan {
            root_type: owner.to_string(),
            mode: FetchMode::Fetch,
            nodes,
            groups: vec![
                MergeGroup {
                    id: 0,
                    anchor: 0,
                    nodes: vec![0],
                },
                MergeGroup {
                    id: 1,
                    anchor: child,
                    nodes: vec![child],
                },
            ],
            group_of: vec![0, 1],
        };
        plan.verify()?;
        Ok(plan)
    }

    fn add_child(
        &self,
        nodes: &mut Vec<PlanNode>,
        parent: usize,
        relationship: &RelationshipMetadata,
        origin: NodeOrigin,
    ) -> OrmResult<usize> {
        let target = self.schema.entity(&relationship.related_model)?;
        let id = nodes.len();
        let parent_node = &nodes[parent];
        let path = if parent_node.is_root() {
            relationship.name.clone()
        } else {
            format!("{}.{}", parent_node.path, relationship.name)
        };
        let depth = parent_node.depth + 1;

        nodes.push(PlanNode {
            id,
            path,
            entity_type: target.name.clone(),
            table: target.table.clone(),
            primary_key: target.primary_key.clone(),
            relationship: Some(relationship.clone()),
            parent: Some(parent),
            children: Vec::new(),
            depth,
            origin,
        });
        nodes[parent].children.push(id);
        Ok(id)
    }

    /// Add eager-default relationships below `node`, recursively. A branch
    /// stops at max_depth, which also bounds cycles of eager relationships.
    fn expand_defaults(&self, nodes: &mut Vec<PlanNode>, node: usize) -> OrmResult<()> {
        let entity = self.schema.entity(&nodes[node].entity_type)?;

        if nodes[node].depth < self.config.max_depth {
            for relationship in entity.eager_relationships() {
                if find_child(nodes, node, &relationship.name).is_some() {
                    continue;
                }
                self.add_child(nodes, node, relationship, NodeOrigin::EntityDefault)?;
            }
        }

        let children = nodes[node].children.clone();
        for child in children {
            self.expand_defaults(nodes, child)?;
        }
        Ok(())
    }
}

fn root_node(entity: &EntityType) -> PlanNode {
    PlanNode {
        id: 0,
        path: String::new(),
        entity_type: entity.name.clone(),
        table: entity.table.clone(),
        primary_key: entity.primary_key.clone(),
        relationship: None,
        parent: None,
        children: Vec::new(),
        depth: 0,
        origin: NodeOrigin::Root,
    }
}

fn find_child(nodes: &[PlanNode], parent: usize, relationship: &str) -> Option<usize> {
    nodes[parent]
        .children
        .iter()
        .copied()
        .find(|&c| nodes[c].relationship_name() == Some(relationship))
}

/// Split the tree into merge groups, walking it depth first.
///
/// To-one edges always join the parent's group. A to-many edge joins only
/// when the group's last to-many node is an ancestor of (or is) the parent;
/// otherwise the edge anchors a new group keyed on the parent's join values.
fn partition(root: &str, mode: FetchMode, nodes: Vec<PlanNode>) -> FetchPlan {
    let mut groups = vec![MergeGroup {
        id: 0,
        anchor: 0,
        nodes: vec![0],
    }];
    let mut tails: Vec<Option<usize>> = vec![None];
    let mut group_of = vec![0; nodes.len()];

    let mut plan = FetchPlan {
        root_type: root.to_string(),
        mode,
        nodes,
        groups: Vec::new(),
        group_of: Vec::new(),
    };

    let mut stack = vec![0usize];
    while let Some(node) = stack.pop() {
        let group = group_of[node];

        for &child in &plan.nodes[node].children {
            let joins_parent = if !plan.nodes[child].is_to_many() {
                true
            } else {
                match tails[group] {
                    None => true,
                    Some(tail) => plan.is_ancestor_or_self(tail, node),
                }
            };

            if joins_parent {
                groups[group].nodes.push(child);
                group_of[child] = group;
                if plan.nodes[child].is_to_many() {
                    tails[group] = Some(child);
                }
            } else {
                let id = groups.len();
                groups.push(MergeGroup {
                    id,
                    anchor: child,
                    nodes: vec![child],
                });
                tails.push(Some(child));
                group_of[child] = id;
            }
        }

        // reversed so children pop in declaration order
        stack.extend(plan.nodes[node].children.iter().rev());
    }

    plan.groups = groups;
    plan.group_of = group_of;
    plan
}
