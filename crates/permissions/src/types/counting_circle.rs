//! Counting-circle assignments.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;

use super::{CountingCircleId, NodeId};

/// Link between a counting circle and a domain of influence.
///
/// A counting circle may be linked to several nodes. Each link carries the
/// tenant responsible for the circle, which is independent of the node owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountingCircleAssignment {
    /// The linked domain of influence.
    pub node_id: NodeId,
    /// The linked counting circle.
    pub counting_circle_id: CountingCircleId,
    /// Name of the counting circle, used for ordering.
    pub counting_circle_name: String,
    /// Tenant responsible for the counting circle.
    pub responsible_tenant: TenantId,
}

impl CountingCircleAssignment {
    /// Creates a new assignment.
    pub fn new(
        node_id: NodeId,
        counting_circle_id: CountingCircleId,
        counting_circle_name: impl Into<String>,
        responsible_tenant: impl Into<TenantId>,
    ) -> Self {
        Self {
            node_id,
            counting_circle_id,
            counting_circle_name: counting_circle_name.into(),
            responsible_tenant: responsible_tenant.into(),
        }
    }
}

/// Assignments grouped by the node they are linked to.
pub type AssignmentMap = HashMap<NodeId, Vec<CountingCircleAssignment>>;

/// Groups flat assignment rows by node id.
pub fn group_assignments(
    assignments: impl IntoIterator<Item = CountingCircleAssignment>,
) -> AssignmentMap {
    let mut map = AssignmentMap::new();
    for assignment in assignments {
        map.entry(assignment.node_id).or_default().push(assignment);
    }
    map
}

/// Selects which assignments a repository should load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentFilter {
    /// Every assignment.
    All,
    /// Assignments of one counting circle, across all nodes.
    CountingCircle(CountingCircleId),
    /// Assignments linked to any of the given nodes.
    Nodes(Vec<NodeId>),
}

impl AssignmentFilter {
    /// Returns `true` if the assignment passes this filter.
    pub fn matches(&self, assignment: &CountingCircleAssignment) -> bool {
        match self {
            AssignmentFilter::All => true,
            AssignmentFilter::CountingCircle(id) => assignment.counting_circle_id == *id,
            AssignmentFilter::Nodes(ids) => ids.contains(&assignment.node_id),
        }
    }
}
