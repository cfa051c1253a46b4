//! Rebuild orchestration.
//!
//! [`RebuildOrchestrator`] is the entry point called by the write-side command
//! handlers. Every operation recomputes permissions over the complete live
//! forest (a change at one node can alter what unrelated tenants inherit) and
//! only differs in which persisted rows it replaces:
//!
//! | Operation | Rows replaced |
//! |-----------|---------------|
//! | [`on_node_created`](RebuildOrchestrator::on_node_created) | none deleted; new node and missing owner stubs inserted |
//! | [`on_hierarchy_changed`](RebuildOrchestrator::on_hierarchy_changed) | node, ancestors, descendants, tenants seen in the subtree, given tenants |
//! | [`on_counting_circle_assignment_changed`](RebuildOrchestrator::on_counting_circle_assignment_changed) | linked nodes, their ancestors, given tenants |
//! | [`rebuild_scoped`](RebuildOrchestrator::rebuild_scoped) | the given scope |
//! | [`full_rebuild`](RebuildOrchestrator::full_rebuild) | everything |
//!
//! The orchestrator takes no locks. Callers must serialize rebuilds whose
//! scopes may overlap and wrap delete-then-insert in their own unit of work.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::compute::PermissionComputer;
use crate::config::EngineConfig;
use crate::core::{HierarchyRepository, PermissionStore, SnapshotRepository};
use crate::error::{PermissionResult, ScopeError};
use crate::snapshot::SnapshotAdapter;
use crate::tenant::TenantId;
use crate::tree::{Forest, TreeBuilder};
use crate::types::{
    AssignmentFilter, CountingCircleId, Node, NodeId, PermissionEntry, RebuildScope,
};

/// A dynamically typed hierarchy repository.
pub type DynHierarchyRepository = Arc<dyn HierarchyRepository>;

/// A dynamically typed permission store.
pub type DynPermissionStore = Arc<dyn PermissionStore>;

/// Outcome of a rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    /// Number of tenants whose permissions were computed.
    pub tenants: usize,
    /// Number of persisted rows deleted.
    pub deleted: u64,
    /// Number of rows inserted.
    pub inserted: u64,
}

/// Recomputes and persists domain-of-influence permissions.
pub struct RebuildOrchestrator {
    hierarchy: DynHierarchyRepository,
    permissions: DynPermissionStore,
    snapshots: SnapshotAdapter,
    config: EngineConfig,
}

impl std::fmt::Debug for RebuildOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RebuildOrchestrator {
    /// Creates an orchestrator over separate collaborators.
    pub fn new(
        hierarchy: DynHierarchyRepository,
        permissions: DynPermissionStore,
        snapshots: Arc<dyn SnapshotRepository>,
    ) -> Self {
        Self {
            hierarchy,
            permissions,
            snapshots: SnapshotAdapter::new(snapshots),
            config: EngineConfig::default(),
        }
    }

    /// Creates an orchestrator over a backend implementing every storage trait.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: HierarchyRepository + PermissionStore + SnapshotRepository + 'static,
    {
        Self::new(backend.clone(), backend.clone(), backend)
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Grants permissions for a freshly created node.
    ///
    /// The node must already be persisted. Tenants with direct access to one
    /// of its ancestors inherit it, and its owner gets an entry plus any
    /// ancestor stubs it does not have yet. Nothing is deleted.
    #[instrument(skip(self, node), fields(node_id = %node.id, owner = %node.owner))]
    pub async fn on_node_created(&self, node: &Node) -> PermissionResult<RebuildSummary> {
        let hierarchy = self.hierarchy.load_hierarchy(node.id).await?;
        let ancestors: BTreeSet<NodeId> = hierarchy.ancestor_ids.iter().copied().collect();

        let existing = if ancestors.is_empty() {
            Vec::new()
        } else {
            let scope = RebuildScope::nodes(ancestors.iter().copied());
            self.permissions.load_entries(Some(&scope)).await?
        };
        let persisted: HashSet<(TenantId, NodeId)> =
            existing.iter().map(PermissionEntry::key).collect();

        let mut tenants = BTreeSet::new();
        tenants.insert(node.owner.clone());
        tenants.extend(
            existing
                .iter()
                .filter(|entry| !entry.is_parent)
                .map(|entry| entry.tenant_id.clone()),
        );

        let forest = self.load_forest().await?;
        let mut acc = PermissionComputer::new(&forest).compute_tenants(&tenants);
        acc.retain(|entry| {
            entry.node_id == node.id
                || (entry.tenant_id == node.owner
                    && ancestors.contains(&entry.node_id)
                    && !persisted.contains(&entry.key()))
        });

        let entries = acc.into_entries();
        let inserted = self.insert_batched(&entries).await?;
        let summary = RebuildSummary {
            tenants: tenants.len(),
            deleted: 0,
            inserted,
        };
        info!(tenants = summary.tenants, inserted, "Granted permissions for new domain of influence");
        Ok(summary)
    }

    /// Rebuilds after a node was updated or moved.
    ///
    /// The scope covers the node, its current ancestors and descendants,
    /// every tenant with a persisted entry in the moved subtree, and
    /// `affected_tenants`. The persisted tenants are the ones that may hold
    /// stubs under a previous parent.
    #[instrument(skip(self), fields(tenants = affected_tenants.len()))]
    pub async fn on_hierarchy_changed(
        &self,
        node_id: NodeId,
        affected_tenants: &[TenantId],
    ) -> PermissionResult<RebuildSummary> {
        let hierarchy = self.hierarchy.load_hierarchy(node_id).await?;

        let subtree = RebuildScope::nodes(
            std::iter::once(node_id).chain(hierarchy.descendant_ids.iter().copied()),
        );
        let persisted: BTreeSet<TenantId> = self
            .permissions
            .load_entries(Some(&subtree))
            .await?
            .into_iter()
            .map(|entry| entry.tenant_id)
            .collect();
        debug!(
            persisted_tenants = persisted.len(),
            "Resolved tenants visible in changed subtree"
        );

        let scope = RebuildScope::nodes(hierarchy.all_ids())
            .with_tenants(persisted)
            .with_tenants(affected_tenants.iter().cloned());
        self.rebuild_scoped(scope).await
    }

    /// Rebuilds after a counting circle's links or responsible tenant changed.
    ///
    /// The scope covers every node the circle is currently linked to, their
    /// ancestors, and `affected_tenants`. A circle without links and without
    /// affected tenants yields an unbounded scope.
    #[instrument(skip(self), fields(tenants = affected_tenants.len()))]
    pub async fn on_counting_circle_assignment_changed(
        &self,
        counting_circle_id: CountingCircleId,
        affected_tenants: &[TenantId],
    ) -> PermissionResult<RebuildSummary> {
        let links = self
            .hierarchy
            .load_assignments(&AssignmentFilter::CountingCircle(counting_circle_id))
            .await?;

        let linked: BTreeSet<NodeId> = links.keys().copied().collect();
        let mut node_ids = linked.clone();
        for node_id in linked {
            let hierarchy = self.hierarchy.load_hierarchy(node_id).await?;
            node_ids.extend(hierarchy.ancestor_ids);
        }
        debug!(
            linked_nodes = links.len(),
            scoped_nodes = node_ids.len(),
            "Resolved counting circle scope"
        );

        let scope = RebuildScope::nodes(node_ids).with_tenants(affected_tenants.iter().cloned());
        self.rebuild_scoped(scope).await
    }

    /// Recomputes everything and replaces only the rows in `scope`.
    ///
    /// An unbounded scope fails with [`ScopeError::Unbounded`] unless
    /// [`EngineConfig::strict_scoping`] is disabled, in which case nothing is
    /// touched.
    #[instrument(skip(self, scope), fields(nodes = scope.node_ids.len(), tenants = scope.tenant_ids.len()))]
    pub async fn rebuild_scoped(&self, scope: RebuildScope) -> PermissionResult<RebuildSummary> {
        if scope.is_unbounded() {
            if self.config.strict_scoping {
                warn!("Refusing scoped rebuild without node or tenant filter");
                return Err(ScopeError::Unbounded {
                    operation: "scoped rebuild".to_string(),
                }
                .into());
            }
            warn!("Skipping scoped rebuild without node or tenant filter");
            return Ok(RebuildSummary::default());
        }

        let forest = self.load_forest().await?;
        let computer = PermissionComputer::new(&forest);
        let tenants = computer.relevant_tenants();
        let mut acc = computer.compute_tenants(&tenants);
        acc.retain(|entry| scope.contains_entry(entry));
        let entries = acc.into_entries();

        let deleted = self.permissions.delete_where(&scope).await?;
        let inserted = self.insert_batched(&entries).await?;

        let summary = RebuildSummary {
            tenants: tenants.len(),
            deleted,
            inserted,
        };
        info!(
            tenants = summary.tenants,
            deleted, inserted, "Rebuilt scoped domain of influence permissions"
        );
        Ok(summary)
    }

    /// Recomputes every tenant and replaces the whole permission table.
    #[instrument(skip(self))]
    pub async fn full_rebuild(&self) -> PermissionResult<RebuildSummary> {
        let forest = self.load_forest().await?;
        let computer = PermissionComputer::new(&forest);
        let tenants = computer.relevant_tenants();
        let entries = computer.compute_tenants(&tenants).into_entries();

        let inserted = entries.len() as u64;
        let deleted = self.permissions.replace_all(entries).await?;

        let summary = RebuildSummary {
            tenants: tenants.len(),
            deleted,
            inserted,
        };
        info!(
            tenants = summary.tenants,
            deleted, inserted, "Rebuilt all domain of influence permissions"
        );
        Ok(summary)
    }

    /// Computes every tenant's entries from historized data valid at `at`.
    pub async fn snapshot(
        &self,
        at: DateTime<Utc>,
        include_deleted_nodes: bool,
        include_deleted_circles: bool,
    ) -> PermissionResult<Vec<PermissionEntry>> {
        self.snapshots
            .compute(at, include_deleted_nodes, include_deleted_circles)
            .await
    }

    async fn load_forest(&self) -> PermissionResult<Forest> {
        let nodes = self.hierarchy.load_all_nodes().await?;
        let assignments = self
            .hierarchy
            .load_assignments(&AssignmentFilter::All)
            .await?;
        let forest = TreeBuilder::new(nodes)
            .with_assignments(&assignments)
            .build()?;
        debug!(nodes = forest.len(), "Loaded domain of influence forest");
        Ok(forest)
    }

    async fn insert_batched(&self, entries: &[PermissionEntry]) -> PermissionResult<u64> {
        let mut inserted = 0;
        for batch in entries.chunks(self.config.insert_batch_size.max(1)) {
            inserted += self.permissions.insert(batch).await?;
        }
        Ok(inserted)
    }
}
