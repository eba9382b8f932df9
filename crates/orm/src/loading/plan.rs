//! Fetch plans: the relationship tree of one query and its partition into
//! merge groups, one statement each.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};
use crate::schema::{Cardinality, RelationshipMetadata};

/// How relationships outside the requested paths are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchMode {
    /// Only the requested paths are loaded; everything else is deferred
    Fetch,
    /// Requested paths are loaded, and so is every relationship whose
    /// default fetch policy is eager
    Load,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Fetch => write!(f, "FETCH"),
            FetchMode::Load => write!(f, "LOAD"),
        }
    }
}

/// Why a node is part of the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeOrigin {
    Root,
    /// Named by a requested path (or a prefix of one)
    Requested,
    /// Added by an eager default in LOAD mode
    EntityDefault,
}

/// A node in the relationship tree
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub id: usize,
    /// Dot path from the root; empty for the root
    pub path: String,
    pub entity_type: String,
    pub table: String,
    pub primary_key: String,
    /// Relationship leading here from the parent (None for root)
    pub relationship: Option<RelationshipMetadata>,
    /// Parent node ID (None for root)
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Depth in the relationship tree
    pub depth: usize,
    pub origin: NodeOrigin,
}

impl PlanNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// True if reaching this node from its parent can multiply rows
    pub fn is_to_many(&self) -> bool {
        self.relationship
            .as_ref()
            .map(|r| r.cardinality() == Cardinality::ToMany)
            .unwrap_or(false)
    }

    pub fn relationship_name(&self) -> Option<&str> {
        self.relationship.as_ref().map(|r| r.name.as_str())
    }
}

/// Nodes fetched by a single statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeGroup {
    pub id: usize,
    /// First node of the group: the root for the primary group, otherwise a
    /// node whose rows are scoped by its parent's join values
    pub anchor: usize,
    /// Member nodes in tree order, anchor first
    pub nodes: Vec<usize>,
}

impl MergeGroup {
    pub fn is_primary(&self) -> bool {
        self.id == 0
    }
}

/// The relationship tree of one query together with its merge groups
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub root_type: String,
    pub mode: FetchMode,
    pub(crate) nodes: Vec<PlanNode>,
    pub(crate) groups: Vec<MergeGroup>,
    /// Group of each node, indexed by node ID
    pub(crate) group_of: Vec<usize>,
}

impl FetchPlan {
    pub fn root(&self) -> &PlanNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: usize) -> &PlanNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    pub fn groups(&self) -> &[MergeGroup] {
        &self.groups
    }

    /// Minimum number of statements the plan needs: one per merge group.
    /// Batches split by size add to it; groups with no parent keys are skipped.
    pub fn statement_count(&self) -> usize {
        self.groups.len()
    }

    pub fn find_node(&self, path: &str) -> Option<&PlanNode> {
        self.nodes.iter().find(|n| n.path == path)
    }

    /// Merge group the node at `path` belongs to
    pub fn group_of(&self, path: &str) -> Option<usize> {
        self.find_node(path).map(|n| self.group_of[n.id])
    }

    /// Child of `node` reached through `relationship`
    pub fn child(&self, node: usize, relationship: &str) -> Option<&PlanNode> {
        self.nodes[node]
            .children
            .iter()
            .map(|&c| &self.nodes[c])
            .find(|c| c.relationship_name() == Some(relationship))
    }

    /// Paths of all non-root nodes in tree order
    pub fn paths(&self) -> Vec<&str> {
        self.nodes.iter().skip(1).map(|n| n.path.as_str()).collect()
    }

    pub fn is_ancestor_or_self(&self, ancestor: usize, node: usize) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id].parent;
        }
        false
    }

    /// Check that no merge group joins two independent to-many branches and
    /// that every non-anchor node sits in its parent's group
    pub fn verify(&self) -> OrmResult<()> {
        for group in &self.groups {
            for &id in &group.nodes {
                if self.group_of[id] != group.id {
                    return Err(OrmError::AmbiguousMerge(format!(
                        "node '{}' listed in group {} but assigned to group {}",
                        self.nodes[id].path, group.id, self.group_of[id]
                    )));
                }
                if id != group.anchor {
                    let parent = self.nodes[id].parent.unwrap_or(group.anchor);
                    if self.group_of[parent] != group.id {
                        return Err(OrmError::AmbiguousMerge(format!(
                            "node '{}' is merged without its parent",
                            self.nodes[id].path
                        )));
                    }
                }
            }

            let mut to_many: Vec<usize> = group
                .nodes
                .iter()
                .copied()
                .filter(|&id| (id == group.anchor && !group.is_primary()) || self.nodes[id].is_to_many())
                .collect();
            to_many.sort_by_key(|&id| self.nodes[id].depth);

            for pair in to_many.windows(2) {
                if !self.is_ancestor_or_self(pair[0], pair[1]) {
                    return Err(OrmError::AmbiguousMerge(format!(
                        "group {} joins sibling to-many paths '{}' and '{}'",
                        group.id, self.nodes[pair[0]].path, self.nodes[pair[1]].path
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for FetchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} ({} statement(s))", self.mode, self.root_type, self.statement_count())?;
        for group in &self.groups {
            let paths: Vec<&str> = group
                .nodes
                .iter()
                .map(|&id| {
                    let node = &self.nodes[id];
                    if node.is_root() {
                        node.entity_type.as_str()
                    } else {
                        node.path.as_str()
                    }
                })
                .collect();
            writeln!(f, "  group {}: {}", group.id, paths.join(", "))?;
        }
        Ok(())
    }
}
