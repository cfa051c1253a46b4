//! Write access to the hierarchy, used by command handlers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PermissionResult;
use crate::types::{CountingCircleAssignment, CountingCircleId, Node, NodeId};

/// Mutates live hierarchy rows and keeps their history.
///
/// Every write closes the current historized version at `at` and opens a new
/// one, so snapshots taken for earlier instants do not change.
#[async_trait]
pub trait HierarchyWriter: Send + Sync {
    /// Creates or updates a node.
    async fn save_node(&self, node: &Node, at: DateTime<Utc>) -> PermissionResult<()>;

    /// Deletes a node, its descendants and their assignments.
    ///
    /// Returns the ids of every deleted node. Deleting an unknown node fails
    /// with [`HierarchyError::NodeNotFound`](crate::error::HierarchyError::NodeNotFound).
    async fn delete_node(&self, node_id: NodeId, at: DateTime<Utc>) -> PermissionResult<Vec<NodeId>>;

    /// Creates or updates the link between a counting circle and a node.
    async fn save_assignment(
        &self,
        assignment: &CountingCircleAssignment,
        at: DateTime<Utc>,
    ) -> PermissionResult<()>;

    /// Removes a link. Returns `false` if it did not exist.
    async fn delete_assignment(
        &self,
        node_id: NodeId,
        counting_circle_id: CountingCircleId,
        at: DateTime<Utc>,
    ) -> PermissionResult<bool>;
}
