//! SQLite schema definitions and migrations.

use rusqlite::Connection;

use crate::error::{BackendError, PermissionError, PermissionResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

fn migration_error(message: String) -> PermissionError {
    PermissionError::Backend(BackendError::MigrationError { message })
}

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> PermissionResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, 1)?;
        migrate_schema(conn, 1)?;
    } else if current_version < SCHEMA_VERSION {
        migrate_schema(conn, current_version)?;
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> PermissionResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| migration_error(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> PermissionResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| migration_error(format!("Failed to clear schema_version: {}", e)))?;

    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| migration_error(format!("Failed to set schema_version: {}", e)))?;

    Ok(())
}

/// Create the initial schema (version 1): live hierarchy and permissions.
fn create_schema_v1(conn: &Connection) -> PermissionResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS domain_of_influences (
            id TEXT NOT NULL PRIMARY KEY,
            name TEXT NOT NULL,
            parent_id TEXT,
            owner_tenant_id TEXT NOT NULL,
            type TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_doi_parent ON domain_of_influences(parent_id);

        CREATE TABLE IF NOT EXISTS doi_counting_circles (
            doi_id TEXT NOT NULL REFERENCES domain_of_influences(id) ON DELETE CASCADE,
            counting_circle_id TEXT NOT NULL,
            counting_circle_name TEXT NOT NULL,
            responsible_tenant_id TEXT NOT NULL,
            PRIMARY KEY (doi_id, counting_circle_id)
        );
        CREATE INDEX IF NOT EXISTS idx_doi_cc_counting_circle
            ON doi_counting_circles(counting_circle_id);

        CREATE TABLE IF NOT EXISTS doi_permissions (
            tenant_id TEXT NOT NULL,
            doi_id TEXT NOT NULL,
            is_parent INTEGER NOT NULL,
            counting_circle_ids TEXT NOT NULL,
            PRIMARY KEY (tenant_id, doi_id)
        );
        CREATE INDEX IF NOT EXISTS idx_doi_permissions_doi ON doi_permissions(doi_id);",
    )
    .map_err(|e| migration_error(format!("Failed to create v1 tables: {}", e)))
}

/// Run migrations from the given version to the current version.
fn migrate_schema(conn: &Connection, from_version: i32) -> PermissionResult<()> {
    let mut version = from_version;

    while version < SCHEMA_VERSION {
        match version {
            1 => migrate_v1_to_v2(conn)?,
            other => {
                return Err(migration_error(format!(
                    "No migration path from schema version {}",
                    other
                )));
            }
        }
        version += 1;
        set_schema_version(conn, version)?;
        tracing::debug!(version, "Migrated permission schema");
    }

    Ok(())
}

/// Version 2: historized hierarchy tables for point-in-time snapshots.
fn migrate_v1_to_v2(conn: &Connection) -> PermissionResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS doi_snapshots (
            id TEXT NOT NULL,
            name TEXT NOT NULL,
            parent_id TEXT,
            owner_tenant_id TEXT NOT NULL,
            type TEXT NOT NULL,
            valid_from TEXT NOT NULL,
            valid_to TEXT,
            deleted INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_doi_snapshots_validity
            ON doi_snapshots(valid_from, valid_to);
        CREATE INDEX IF NOT EXISTS idx_doi_snapshots_id ON doi_snapshots(id);

        CREATE TABLE IF NOT EXISTS doi_cc_snapshots (
            doi_id TEXT NOT NULL,
            counting_circle_id TEXT NOT NULL,
            counting_circle_name TEXT NOT NULL,
            responsible_tenant_id TEXT NOT NULL,
            valid_from TEXT NOT NULL,
            valid_to TEXT,
            deleted INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_doi_cc_snapshots_validity
            ON doi_cc_snapshots(valid_from, valid_to);
        CREATE INDEX IF NOT EXISTS idx_doi_cc_snapshots_link
            ON doi_cc_snapshots(doi_id, counting_circle_id);",
    )
    .map_err(|e| migration_error(format!("Failed to create v2 snapshot tables: {}", e)))
}
