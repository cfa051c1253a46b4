//! Error types for the permission engine.
//!
//! Errors are grouped by category: hierarchy errors raised while turning flat
//! node rows into a forest, scope errors raised when a rebuild is asked to
//! touch an unbounded set of rows, and backend errors raised by storage.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::types::NodeId;

/// The primary error type for all engine operations.
#[derive(Error, Debug)]
pub enum PermissionError {
    /// The loaded hierarchy is not a well-formed forest.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// A scoped rebuild was requested without any scope.
    #[error(transparent)]
    Scope(#[from] ScopeError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors describing an inconsistent domain-of-influence hierarchy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    /// Two nodes share the same id.
    #[error("duplicate domain of influence: {node_id}")]
    DuplicateNode { node_id: NodeId },

    /// A node references a parent that is not part of the loaded node set.
    #[error("domain of influence {node_id} references unknown parent {parent_id}")]
    DanglingParent { node_id: NodeId, parent_id: NodeId },

    /// The parent relation contains a cycle through the given node.
    #[error("cycle in domain of influence hierarchy at {node_id}")]
    Cycle { node_id: NodeId },

    /// The requested node does not exist.
    #[error("domain of influence not found: {node_id}")]
    NodeNotFound { node_id: NodeId },
}

/// Errors related to rebuild scoping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// Both the node filter and the tenant filter are empty.
    #[error("{operation} requires at least one node id or tenant id in scope")]
    Unbounded { operation: String },
}

/// Errors originating from the storage backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type alias for engine operations.
pub type PermissionResult<T> = Result<T, PermissionError>;

/// Result type alias for hierarchy construction.
pub type HierarchyResult<T> = Result<T, HierarchyError>;

impl From<serde_json::Error> for PermissionError {
    fn from(err: serde_json::Error) -> Self {
        PermissionError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for PermissionError {
    fn from(err: rusqlite::Error) -> Self {
        PermissionError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for PermissionError {
    fn from(_err: r2d2::Error) -> Self {
        PermissionError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}
