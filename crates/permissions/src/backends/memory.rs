//! In-memory backend.
//!
//! Keeps live rows, historized rows and the permission table in ordered maps
//! behind a single [`RwLock`]. Useful for tests and for embedding the engine
//! without a database.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::core::{
    HierarchyRepository, HierarchyWriter, NodeHierarchy, PermissionStore, SnapshotRepository,
};
use crate::error::{HierarchyError, PermissionResult, ScopeError};
use crate::tenant::TenantId;
use crate::types::{
    group_assignments, AssignmentFilter, AssignmentMap, CountingCircleAssignment,
    CountingCircleId, Node, NodeId, PermissionEntry, RebuildScope, SnapshotAssignment,
    SnapshotNode, Validity,
};

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<NodeId, Node>,
    assignments: BTreeMap<(NodeId, CountingCircleId), CountingCircleAssignment>,
    permissions: BTreeMap<(TenantId, NodeId), PermissionEntry>,
    node_history: Vec<SnapshotNode>,
    assignment_history: Vec<SnapshotAssignment>,
}

impl State {
    fn children_of(&self, node_id: &NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let node_id = *node_id;
        self.nodes
            .values()
            .filter(move |node| node.parent_id == Some(node_id))
            .map(|node| node.id)
    }

    fn ancestors_of(&self, node_id: &NodeId) -> PermissionResult<Vec<NodeId>> {
        let mut ancestors = Vec::new();
        let mut seen = BTreeSet::from([*node_id]);
        let mut current = self.nodes.get(node_id).and_then(|node| node.parent_id);
        while let Some(parent_id) = current {
            if !self.nodes.contains_key(&parent_id) {
                break;
            }
            if !seen.insert(parent_id) {
                return Err(HierarchyError::Cycle { node_id: parent_id }.into());
            }
            ancestors.push(parent_id);
            current = self.nodes.get(&parent_id).and_then(|node| node.parent_id);
        }
        Ok(ancestors)
    }

    fn descendants_of(&self, node_id: &NodeId) -> Vec<NodeId> {
        let mut descendants = BTreeSet::new();
        let mut pending: Vec<NodeId> = self.children_of(node_id).collect();
        while let Some(id) = pending.pop() {
            if id != *node_id && descendants.insert(id) {
                pending.extend(self.children_of(&id));
            }
        }
        descendants.into_iter().collect()
    }

    fn close_node_version(&mut self, node_id: &NodeId, at: DateTime<Utc>) {
        for version in self
            .node_history
            .iter_mut()
            .filter(|v| v.node.id == *node_id && v.validity.is_current())
        {
            version.validity.valid_to = Some(at);
        }
    }

    fn close_assignment_version(
        &mut self,
        node_id: &NodeId,
        counting_circle_id: &CountingCircleId,
        at: DateTime<Utc>,
    ) {
        for version in self.assignment_history.iter_mut().filter(|v| {
            v.assignment.node_id == *node_id
                && v.assignment.counting_circle_id == *counting_circle_id
                && v.validity.is_current()
        }) {
            version.validity.valid_to = Some(at);
        }
    }

    fn remove_assignment(
        &mut self,
        node_id: NodeId,
        counting_circle_id: CountingCircleId,
        at: DateTime<Utc>,
    ) -> bool {
        let Some(removed) = self.assignments.remove(&(node_id, counting_circle_id)) else {
            return false;
        };
        self.close_assignment_version(&node_id, &counting_circle_id, at);
        self.assignment_history.push(SnapshotAssignment {
            assignment: removed,
            validity: Validity::starting(at),
            deleted: true,
        });
        true
    }
}

/// In-memory implementation of every storage trait.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: RwLock<State>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    /// Number of persisted permission entries.
    pub fn permission_count(&self) -> usize {
        self.state.read().permissions.len()
    }
}

#[async_trait]
impl HierarchyRepository for InMemoryBackend {
    async fn load_all_nodes(&self) -> PermissionResult<Vec<Node>> {
        Ok(self.state.read().nodes.values().cloned().collect())
    }

    async fn load_hierarchy(&self, node_id: NodeId) -> PermissionResult<NodeHierarchy> {
        let state = self.state.read();
        if !state.nodes.contains_key(&node_id) {
            return Err(HierarchyError::NodeNotFound { node_id }.into());
        }
        Ok(NodeHierarchy {
            node_id,
            ancestor_ids: state.ancestors_of(&node_id)?,
            descendant_ids: state.descendants_of(&node_id),
        })
    }

    async fn load_assignments(&self, filter: &AssignmentFilter) -> PermissionResult<AssignmentMap> {
        let state = self.state.read();
        Ok(group_assignments(
            state
                .assignments
                .values()
                .filter(|assignment| filter.matches(assignment))
                .cloned(),
        ))
    }
}

#[async_trait]
impl PermissionStore for InMemoryBackend {
    async fn replace_all(&self, entries: Vec<PermissionEntry>) -> PermissionResult<u64> {
        let mut state = self.state.write();
        let deleted = state.permissions.len() as u64;
        state.permissions = entries.into_iter().map(|e| (e.key(), e)).collect();
        Ok(deleted)
    }

    async fn delete_where(&self, scope: &RebuildScope) -> PermissionResult<u64> {
        if scope.is_unbounded() {
            return Err(ScopeError::Unbounded {
                operation: "permission delete".to_string(),
            }
            .into());
        }
        let mut state = self.state.write();
        let before = state.permissions.len();
        state
            .permissions
            .retain(|(tenant_id, node_id), _| !scope.contains(tenant_id, node_id));
        Ok((before - state.permissions.len()) as u64)
    }

    async fn insert(&self, entries: &[PermissionEntry]) -> PermissionResult<u64> {
        let mut state = self.state.write();
        for entry in entries {
            state.permissions.insert(entry.key(), entry.clone());
        }
        Ok(entries.len() as u64)
    }

    async fn load_entries(
        &self,
        scope: Option<&RebuildScope>,
    ) -> PermissionResult<Vec<PermissionEntry>> {
        let state = self.state.read();
        Ok(state
            .permissions
            .values()
            .filter(|entry| scope.is_none_or(|s| s.contains_entry(entry)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryBackend {
    async fn load_nodes_at(
        &self,
        at: DateTime<Utc>,
        include_deleted: bool,
    ) -> PermissionResult<Vec<SnapshotNode>> {
        let state = self.state.read();
        Ok(state
            .node_history
            .iter()
            .filter(|version| version.is_visible_at(at, include_deleted))
            .cloned()
            .collect())
    }

    async fn load_assignments_at(
        &self,
        at: DateTime<Utc>,
        include_deleted: bool,
    ) -> PermissionResult<Vec<SnapshotAssignment>> {
        let state = self.state.read();
        Ok(state
            .assignment_history
            .iter()
            .filter(|version| version.is_visible_at(at, include_deleted))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HierarchyWriter for InMemoryBackend {
    async fn save_node(&self, node: &Node, at: DateTime<Utc>) -> PermissionResult<()> {
        let mut state = self.state.write();
        state.nodes.insert(node.id, node.clone());
        state.close_node_version(&node.id, at);
        state.node_history.push(SnapshotNode {
            node: node.clone(),
            validity: Validity::starting(at),
            deleted: false,
        });
        Ok(())
    }

    async fn delete_node(&self, node_id: NodeId, at: DateTime<Utc>) -> PermissionResult<Vec<NodeId>> {
        let mut state = self.state.write();
        if !state.nodes.contains_key(&node_id) {
            return Err(HierarchyError::NodeNotFound { node_id }.into());
        }

        let mut removed = vec![node_id];
        removed.extend(state.descendants_of(&node_id));

        for id in &removed {
            let links: Vec<CountingCircleId> = state
                .assignments
                .keys()
                .filter(|(linked, _)| linked == id)
                .map(|(_, circle)| *circle)
                .collect();
            for circle in links {
                state.remove_assignment(*id, circle, at);
            }

            if let Some(node) = state.nodes.remove(id) {
                state.close_node_version(id, at);
                state.node_history.push(SnapshotNode {
                    node,
                    validity: Validity::starting(at),
                    deleted: true,
                });
            }
        }
        Ok(removed)
    }

    async fn save_assignment(
        &self,
        assignment: &CountingCircleAssignment,
        at: DateTime<Utc>,
    ) -> PermissionResult<()> {
        let mut state = self.state.write();
        if !state.nodes.contains_key(&assignment.node_id) {
            return Err(HierarchyError::NodeNotFound {
                node_id: assignment.node_id,
            }
            .into());
        }
        state.assignments.insert(
            (assignment.node_id, assignment.counting_circle_id),
            assignment.clone(),
        );
        state.close_assignment_version(&assignment.node_id, &assignment.counting_circle_id, at);
        state.assignment_history.push(SnapshotAssignment {
            assignment: assignment.clone(),
            validity: Validity::starting(at),
            deleted: false,
        });
        Ok(())
    }

    async fn delete_assignment(
        &self,
        node_id: NodeId,
        counting_circle_id: CountingCircleId,
        at: DateTime<Utc>,
    ) -> PermissionResult<bool> {
        Ok(self
            .state
            .write()
            .remove_assignment(node_id, counting_circle_id, at))
    }
}
