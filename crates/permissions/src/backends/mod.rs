//! Storage backend implementations.
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | In-memory | always | Ordered maps behind a lock, for tests and embedding |
//! | SQLite | `sqlite` | Pooled embedded database with schema migrations |
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! use basis_permissions::backends::sqlite::SqliteBackend;
//!
//! # #[cfg(feature = "sqlite")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//! # Ok(())
//! # }
//! ```

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;
