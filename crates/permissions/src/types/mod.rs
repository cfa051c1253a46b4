//! Core record types shared by the tree builder, the permission computer and
//! the storage traits.

mod counting_circle;
mod ids;
mod node;
mod permission;
mod snapshot;

pub use counting_circle::{
    group_assignments, AssignmentFilter, AssignmentMap, CountingCircleAssignment,
};
pub use ids::{CountingCircleId, NodeId};
pub use node::{DomainOfInfluenceType, Node};
pub use permission::{PermissionEntry, RebuildScope};
pub use snapshot::{SnapshotAssignment, SnapshotNode, Validity};
