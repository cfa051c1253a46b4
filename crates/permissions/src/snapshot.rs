//! Historical permission computation.
//!
//! [`SnapshotAdapter`] runs the same tree construction and permission walk as
//! a live rebuild, but over node and assignment versions valid at a given
//! instant. Nothing is persisted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::compute::PermissionComputer;
use crate::core::SnapshotRepository;
use crate::error::PermissionResult;
use crate::tree::TreeBuilder;
use crate::types::{group_assignments, Node, PermissionEntry};

/// Computes permission entries from historized data.
#[derive(Clone)]
pub struct SnapshotAdapter {
    repository: Arc<dyn SnapshotRepository>,
}

impl std::fmt::Debug for SnapshotAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotAdapter").finish_non_exhaustive()
    }
}

impl SnapshotAdapter {
    /// Creates an adapter over the given repository.
    pub fn new(repository: Arc<dyn SnapshotRepository>) -> Self {
        Self { repository }
    }

    /// Computes every tenant's entries as of `at`, ordered by tenant then node.
    pub async fn compute(
        &self,
        at: DateTime<Utc>,
        include_deleted_nodes: bool,
        include_deleted_circles: bool,
    ) -> PermissionResult<Vec<PermissionEntry>> {
        let nodes: Vec<Node> = self
            .repository
            .load_nodes_at(at, include_deleted_nodes)
            .await?
            .into_iter()
            .map(|snapshot| snapshot.node)
            .collect();
        let assignments = group_assignments(
            self.repository
                .load_assignments_at(at, include_deleted_circles)
                .await?
                .into_iter()
                .map(|snapshot| snapshot.assignment),
        );

        let forest = TreeBuilder::new(nodes)
            .with_assignments(&assignments)
            .build()?;
        let entries = PermissionComputer::new(&forest).compute_all().into_entries();

        debug!(
            at = %at,
            nodes = forest.len(),
            entries = entries.len(),
            "Computed permission snapshot"
        );
        Ok(entries)
    }
}
