//! SQLite backend implementation.
//!
//! Implements every storage trait on top of a pooled SQLite database, either
//! in memory (for tests) or file based.
//!
//! # Example
//!
//! ```no_run
//! use basis_permissions::backends::sqlite::SqliteBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open("./data/permissions.db")?;
//! backend.init_schema()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! -- Live hierarchy
//! CREATE TABLE domain_of_influences (
//!     id TEXT NOT NULL PRIMARY KEY,
//!     name TEXT NOT NULL,
//!     parent_id TEXT,
//!     owner_tenant_id TEXT NOT NULL,
//!     type TEXT NOT NULL
//! );
//!
//! CREATE TABLE doi_counting_circles (
//!     doi_id TEXT NOT NULL,
//!     counting_circle_id TEXT NOT NULL,
//!     counting_circle_name TEXT NOT NULL,
//!     responsible_tenant_id TEXT NOT NULL,
//!     PRIMARY KEY (doi_id, counting_circle_id)
//! );
//!
//! -- Derived permissions, counting circle ids as a JSON array
//! CREATE TABLE doi_permissions (
//!     tenant_id TEXT NOT NULL,
//!     doi_id TEXT NOT NULL,
//!     is_parent INTEGER NOT NULL,
//!     counting_circle_ids TEXT NOT NULL,
//!     PRIMARY KEY (tenant_id, doi_id)
//! );
//!
//! -- History, one row per version valid over [valid_from, valid_to)
//! CREATE TABLE doi_snapshots (..., valid_from TEXT, valid_to TEXT, deleted INTEGER);
//! CREATE TABLE doi_cc_snapshots (..., valid_from TEXT, valid_to TEXT, deleted INTEGER);
//! ```
//!
//! Timestamps are stored as RFC 3339 strings with microsecond precision.

mod backend;
mod schema;
mod storage;

pub use backend::{SqliteBackend, SqliteBackendConfig};
