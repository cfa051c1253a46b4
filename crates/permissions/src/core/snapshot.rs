//! Point-in-time access to historized hierarchy data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PermissionResult;
use crate::types::{SnapshotAssignment, SnapshotNode};

/// Loads historized nodes and assignments valid at an instant.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Loads the node versions valid at `at`.
    ///
    /// Deleted versions are only returned when `include_deleted` is set.
    async fn load_nodes_at(
        &self,
        at: DateTime<Utc>,
        include_deleted: bool,
    ) -> PermissionResult<Vec<SnapshotNode>>;

    /// Loads the assignment versions valid at `at`.
    async fn load_assignments_at(
        &self,
        at: DateTime<Utc>,
        include_deleted: bool,
    ) -> PermissionResult<Vec<SnapshotAssignment>>;
}
