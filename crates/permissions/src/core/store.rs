//! Persistence of computed permission entries.

use async_trait::async_trait;

use crate::error::PermissionResult;
use crate::types::{PermissionEntry, RebuildScope};

/// Storage for the derived permission table.
///
/// Entries are never edited in place: rebuilds delete the rows of a scope and
/// insert the recomputed ones. Atomicity across [`delete_where`] and
/// [`insert`] is the caller's responsibility.
///
/// [`delete_where`]: PermissionStore::delete_where
/// [`insert`]: PermissionStore::insert
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Replaces the whole table with `entries`.
    ///
    /// Returns the number of rows removed.
    async fn replace_all(&self, entries: Vec<PermissionEntry>) -> PermissionResult<u64>;

    /// Deletes every row in scope.
    ///
    /// Fails with [`ScopeError::Unbounded`](crate::error::ScopeError::Unbounded)
    /// when the scope restricts nothing. Returns the number of rows removed.
    async fn delete_where(&self, scope: &RebuildScope) -> PermissionResult<u64>;

    /// Inserts entries. Returns the number of rows written.
    async fn insert(&self, entries: &[PermissionEntry]) -> PermissionResult<u64>;

    /// Loads the rows in scope, or every row when `scope` is `None`,
    /// ordered by tenant then node.
    async fn load_entries(
        &self,
        scope: Option<&RebuildScope>,
    ) -> PermissionResult<Vec<PermissionEntry>>;
}
