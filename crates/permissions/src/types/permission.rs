//! Permission entries and rebuild scopes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;

use super::{CountingCircleId, NodeId};

/// A derived record asserting that a tenant may view a domain of influence.
///
/// The composite key is `(tenant_id, node_id)`; at most one entry exists per
/// key. `is_parent == false` means the tenant owns the node or inherits
/// ownership from an ancestor. `is_parent == true` means the node is visible
/// only as an ancestor of something visible, or only through the listed
/// counting circles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    /// Tenant granted visibility.
    pub tenant_id: TenantId,
    /// Visible node.
    pub node_id: NodeId,
    /// Whether the visibility is not direct.
    pub is_parent: bool,
    /// Counting circles visible at this node, empty for ancestor stubs.
    pub counting_circle_ids: Vec<CountingCircleId>,
}

impl PermissionEntry {
    /// Creates an entry.
    pub fn new(
        tenant_id: TenantId,
        node_id: NodeId,
        is_parent: bool,
        counting_circle_ids: Vec<CountingCircleId>,
    ) -> Self {
        Self {
            tenant_id,
            node_id,
            is_parent,
            counting_circle_ids,
        }
    }

    /// Creates an ancestor-only entry without counting circles.
    pub fn parent_stub(tenant_id: TenantId, node_id: NodeId) -> Self {
        Self::new(tenant_id, node_id, true, Vec::new())
    }

    /// Returns the composite key of this entry.
    pub fn key(&self) -> (TenantId, NodeId) {
        (self.tenant_id.clone(), self.node_id)
    }
}

/// The set of rows a scoped rebuild deletes and reinserts.
///
/// A row is in scope when its node id is in `node_ids` **or** its tenant id
/// is in `tenant_ids`. A scope with both sets empty is unbounded and is
/// refused by every scoped operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildScope {
    /// Affected nodes.
    pub node_ids: BTreeSet<NodeId>,
    /// Affected tenants.
    pub tenant_ids: BTreeSet<TenantId>,
}

impl RebuildScope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scope over the given nodes.
    pub fn nodes(node_ids: impl IntoIterator<Item = NodeId>) -> Self {
        Self::new().with_nodes(node_ids)
    }

    /// Creates a scope over the given tenants.
    pub fn tenants(tenant_ids: impl IntoIterator<Item = TenantId>) -> Self {
        Self::new().with_tenants(tenant_ids)
    }

    /// Adds nodes to the scope.
    pub fn with_nodes(mut self, node_ids: impl IntoIterator<Item = NodeId>) -> Self {
        self.node_ids.extend(node_ids);
        self
    }

    /// Adds tenants to the scope.
    pub fn with_tenants(mut self, tenant_ids: impl IntoIterator<Item = TenantId>) -> Self {
        self.tenant_ids.extend(tenant_ids);
        self
    }

    /// Returns `true` if neither filter restricts anything.
    pub fn is_unbounded(&self) -> bool {
        self.node_ids.is_empty() && self.tenant_ids.is_empty()
    }

    /// Returns `true` if the row keyed by `(tenant_id, node_id)` is in scope.
    pub fn contains(&self, tenant_id: &TenantId, node_id: &NodeId) -> bool {
        self.node_ids.contains(node_id) || self.tenant_ids.contains(tenant_id)
    }

    /// Returns `true` if the entry is in scope.
    pub fn contains_entry(&self, entry: &PermissionEntry) -> bool {
        self.contains(&entry.tenant_id, &entry.node_id)
    }
}
