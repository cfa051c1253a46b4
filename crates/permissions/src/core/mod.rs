//! Storage traits consumed by the rebuild orchestrator.
//!
//! - [`HierarchyRepository`] - live nodes, their ancestry and assignments
//! - [`PermissionStore`] - the derived permission table
//! - [`SnapshotRepository`] - historized nodes and assignments
//! - [`HierarchyWriter`] - write side mutations with history upkeep
//!
//! Backends in [`crate::backends`] implement all four.

pub mod hierarchy;
pub mod snapshot;
pub mod store;
pub mod writer;

pub use hierarchy::{HierarchyRepository, NodeHierarchy};
pub use snapshot::SnapshotRepository;
pub use store::PermissionStore;
pub use writer::HierarchyWriter;
