//! Forest construction from flat domain-of-influence rows.
//!
//! [`TreeBuilder`] validates the parent relation and produces a [`Forest`]:
//! an immutable arena of nodes addressed by index. Parent and child links are
//! index lists computed once per build, so input records are never mutated
//! and a forest can be dropped without any cleanup.
//!
//! # Example
//!
//! ```
//! use basis_permissions::tree::TreeBuilder;
//! use basis_permissions::types::{DomainOfInfluenceType, Node};
//!
//! let canton = Node::new("St. Gallen", "sg", DomainOfInfluenceType::Ct);
//! let gossau = Node::new("Gossau", "gossau", DomainOfInfluenceType::Mu).with_parent(canton.id);
//! let andwil = Node::new("Andwil", "andwil", DomainOfInfluenceType::Mu).with_parent(canton.id);
//!
//! let forest = TreeBuilder::new(vec![gossau, canton, andwil]).build().unwrap();
//! let root = forest.roots()[0];
//! let names: Vec<_> = forest
//!     .children(root)
//!     .iter()
//!     .map(|&idx| forest.node(idx).name.as_str())
//!     .collect();
//! assert_eq!(names, vec!["Andwil", "Gossau"]);
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{HierarchyError, HierarchyResult};
use crate::tenant::TenantId;
use crate::types::{AssignmentMap, CountingCircleAssignment, CountingCircleId, Node, NodeId};

/// A counting circle attached to a forest node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedCountingCircle {
    /// Counting circle id.
    pub id: CountingCircleId,
    /// Counting circle name.
    pub name: String,
    /// Tenant responsible for the circle on this link.
    pub responsible_tenant: TenantId,
}

impl From<&CountingCircleAssignment> for AttachedCountingCircle {
    fn from(assignment: &CountingCircleAssignment) -> Self {
        Self {
            id: assignment.counting_circle_id,
            name: assignment.counting_circle_name.clone(),
            responsible_tenant: assignment.responsible_tenant.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    parent: Option<usize>,
    children: Vec<usize>,
    counting_circles: Vec<AttachedCountingCircle>,
}

/// An immutable forest of domains of influence.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    slots: Vec<Slot>,
    roots: Vec<usize>,
    index: HashMap<NodeId, usize>,
}

impl Forest {
    /// Number of nodes in the forest.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the forest has no nodes.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Root indexes, ordered by name.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// The node stored at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` was not obtained from this forest.
    pub fn node(&self, idx: usize) -> &Node {
        &self.slots[idx].node
    }

    /// Parent index of the node at `idx`.
    pub fn parent(&self, idx: usize) -> Option<usize> {
        self.slots[idx].parent
    }

    /// Child indexes of the node at `idx`, ordered by name.
    pub fn children(&self, idx: usize) -> &[usize] {
        &self.slots[idx].children
    }

    /// Counting circles attached to the node at `idx`, ordered by name.
    pub fn counting_circles(&self, idx: usize) -> &[AttachedCountingCircle] {
        &self.slots[idx].counting_circles
    }

    /// Looks up the index of a node id.
    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Iterates the strict ancestors of `idx`, nearest first.
    pub fn ancestors(&self, idx: usize) -> Ancestors<'_> {
        Ancestors {
            forest: self,
            next: self.parent(idx),
        }
    }

    /// Returns all indexes in depth-first pre-order, roots in name order.
    pub fn pre_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.slots.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(self.children(idx).iter().rev());
        }
        order
    }
}

/// Iterator over the ancestors of a forest node.
pub struct Ancestors<'a> {
    forest: &'a Forest,
    next: Option<usize>,
}

impl Iterator for Ancestors<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.forest.parent(current);
        Some(current)
    }
}

/// Builds a [`Forest`] from flat node rows and optional assignments.
#[derive(Debug)]
pub struct TreeBuilder<'a> {
    nodes: Vec<Node>,
    assignments: Option<&'a AssignmentMap>,
}

impl<'a> TreeBuilder<'a> {
    /// Creates a builder over the given nodes.
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            assignments: None,
        }
    }

    /// Attaches counting circles from the given assignment map.
    pub fn with_assignments(mut self, assignments: &'a AssignmentMap) -> Self {
        self.assignments = Some(assignments);
        self
    }

    /// Validates the hierarchy and builds the forest.
    ///
    /// Fails on duplicate node ids, on parent ids absent from the input and on
    /// cycles in the parent relation.
    pub fn build(self) -> HierarchyResult<Forest> {
        let mut index = HashMap::with_capacity(self.nodes.len());
        for (idx, node) in self.nodes.iter().enumerate() {
            if index.insert(node.id, idx).is_some() {
                return Err(HierarchyError::DuplicateNode { node_id: node.id });
            }
        }

        let mut slots = Vec::with_capacity(self.nodes.len());
        for node in self.nodes {
            let parent = match node.parent_id {
                Some(parent_id) => Some(*index.get(&parent_id).ok_or(
                    HierarchyError::DanglingParent {
                        node_id: node.id,
                        parent_id,
                    },
                )?),
                None => None,
            };

            let counting_circles = self
                .assignments
                .and_then(|map| map.get(&node.id))
                .map(|assignments| attach_counting_circles(assignments))
                .unwrap_or_default();

            slots.push(Slot {
                node,
                parent,
                children: Vec::new(),
                counting_circles,
            });
        }

        let mut roots = Vec::new();
        for idx in 0..slots.len() {
            let parent = slots[idx].parent;
            match parent {
                Some(parent) => slots[parent].children.push(idx),
                None => roots.push(idx),
            }
        }

        for idx in 0..slots.len() {
            let mut children = std::mem::take(&mut slots[idx].children);
            children.sort_by(|&a, &b| by_name(&slots[a].node, &slots[b].node));
            slots[idx].children = children;
        }
        roots.sort_by(|&a, &b| by_name(&slots[a].node, &slots[b].node));

        let forest = Forest {
            slots,
            roots,
            index,
        };
        check_acyclic(&forest)?;
        Ok(forest)
    }
}

fn by_name(a: &Node, b: &Node) -> Ordering {
    a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))
}

fn attach_counting_circles(assignments: &[CountingCircleAssignment]) -> Vec<AttachedCountingCircle> {
    let mut circles: Vec<AttachedCountingCircle> =
        assignments.iter().map(AttachedCountingCircle::from).collect();
    circles.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    circles
}

/// Every node must be reachable from a root; a node that is not sits on or
/// below a cycle of the parent relation.
fn check_acyclic(forest: &Forest) -> HierarchyResult<()> {
    let visited = forest.pre_order();
    if visited.len() == forest.len() {
        return Ok(());
    }

    let mut reachable = vec![false; forest.len()];
    for idx in visited {
        reachable[idx] = true;
    }
    let Some(start) = reachable.iter().position(|seen| !seen) else {
        return Ok(());
    };

    // Walk parent links until a node repeats; that node lies on the cycle.
    let mut on_path = vec![false; forest.len()];
    let mut current = start;
    loop {
        if on_path[current] {
            return Err(HierarchyError::Cycle {
                node_id: forest.node(current).id,
            });
        }
        on_path[current] = true;
        match forest.parent(current) {
            Some(parent) => current = parent,
            None => {
                return Err(HierarchyError::Cycle {
                    node_id: forest.node(start).id,
                });
            }
        }
    }
}
