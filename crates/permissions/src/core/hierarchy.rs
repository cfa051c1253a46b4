//! Read access to the live hierarchy and its counting-circle assignments.

use async_trait::async_trait;

use crate::error::PermissionResult;
use crate::types::{AssignmentFilter, AssignmentMap, Node, NodeId};

/// Ancestors and descendants of a node in the live hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeHierarchy {
    /// The node the hierarchy was loaded for.
    pub node_id: NodeId,
    /// Strict ancestors, nearest first.
    pub ancestor_ids: Vec<NodeId>,
    /// Strict descendants, ordered by id.
    pub descendant_ids: Vec<NodeId>,
}

impl NodeHierarchy {
    /// Returns the node itself, its ancestors and its descendants.
    pub fn all_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(self.node_id)
            .chain(self.ancestor_ids.iter().copied())
            .chain(self.descendant_ids.iter().copied())
    }
}

/// Loads domains of influence and counting-circle assignments.
///
/// # Example
///
/// ```ignore
/// use basis_permissions::core::HierarchyRepository;
/// use basis_permissions::types::AssignmentFilter;
///
/// async fn count_links<R: HierarchyRepository>(repo: &R) -> usize {
///     let map = repo.load_assignments(&AssignmentFilter::All).await.unwrap();
///     map.values().map(Vec::len).sum()
/// }
/// ```
#[async_trait]
pub trait HierarchyRepository: Send + Sync {
    /// Loads every live node.
    async fn load_all_nodes(&self) -> PermissionResult<Vec<Node>>;

    /// Loads the ancestors and descendants of a node.
    ///
    /// Fails with [`HierarchyError::NodeNotFound`](crate::error::HierarchyError::NodeNotFound)
    /// for an unknown node.
    async fn load_hierarchy(&self, node_id: NodeId) -> PermissionResult<NodeHierarchy>;

    /// Loads assignments matching the filter, grouped by node.
    async fn load_assignments(&self, filter: &AssignmentFilter) -> PermissionResult<AssignmentMap>;
}
