//! Domain-of-influence permission engine.
//!
//! Domains of influence (political units such as cantons, districts and
//! municipalities) form a forest. Each node is owned by a tenant and may be
//! linked to counting circles, each with its own responsible tenant. This
//! crate derives, per tenant, which nodes are visible, whether the access is
//! direct or only as an ancestor, and which counting circles are visible at
//! each node.
//!
//! # Architecture
//!
//! - [`tree`] - validates flat rows and builds an index-based [`Forest`]
//! - [`compute`] - per-tenant depth-first walk producing [`PermissionEntry`] rows
//! - [`rebuild`] - orchestrates full and scoped rebuilds against storage
//! - [`snapshot`] - point-in-time computation over historized rows
//! - [`core`] - storage traits
//! - [`backends`] - in-memory and SQLite implementations
//! - [`config`] - engine configuration
//! - [`error`] - error types for all operations
//!
//! # Features
//!
//! - `sqlite` (default) - SQLite backend with in-memory and file modes
//!
//! # Quick Start
//!
//! ```
//! use basis_permissions::compute::PermissionComputer;
//! use basis_permissions::tenant::TenantId;
//! use basis_permissions::tree::TreeBuilder;
//! use basis_permissions::types::{DomainOfInfluenceType, Node};
//!
//! let canton = Node::new("Canton", "canton", DomainOfInfluenceType::Ct);
//! let town = Node::new("Town", "town", DomainOfInfluenceType::Mu).with_parent(canton.id);
//!
//! let forest = TreeBuilder::new(vec![canton.clone(), town.clone()]).build()?;
//! let acc = PermissionComputer::new(&forest).compute_all();
//!
//! // The canton sees its whole subtree directly.
//! let tenant = TenantId::new("canton");
//! assert!(!acc.get(&tenant, &town.id).unwrap().is_parent);
//!
//! // The town sees the canton only as its ancestor.
//! let tenant = TenantId::new("town");
//! assert!(acc.get(&tenant, &canton.id).unwrap().is_parent);
//! # Ok::<(), basis_permissions::HierarchyError>(())
//! ```
//!
//! # Persistence
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use basis_permissions::backends::sqlite::SqliteBackend;
//! use basis_permissions::RebuildOrchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(SqliteBackend::open("./data/permissions.db")?);
//! backend.init_schema()?;
//!
//! let orchestrator = RebuildOrchestrator::from_backend(backend);
//! let summary = orchestrator.full_rebuild().await?;
//! println!("{} permission rows", summary.inserted);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod compute;
pub mod config;
pub mod core;
pub mod error;
pub mod rebuild;
pub mod snapshot;
pub mod tenant;
pub mod tree;
pub mod types;

// Re-export commonly used types at crate root
pub use compute::{PermissionAccumulator, PermissionComputer};
pub use config::EngineConfig;
pub use error::{
    BackendError, HierarchyError, HierarchyResult, PermissionError, PermissionResult, ScopeError,
};
pub use rebuild::{RebuildOrchestrator, RebuildSummary};
pub use snapshot::SnapshotAdapter;
pub use tenant::TenantId;
pub use tree::{Forest, TreeBuilder};
pub use types::{
    CountingCircleAssignment, CountingCircleId, DomainOfInfluenceType, Node, NodeId,
    PermissionEntry, RebuildScope,
};

// Re-export core traits
pub use core::{HierarchyRepository, HierarchyWriter, PermissionStore, SnapshotRepository};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
