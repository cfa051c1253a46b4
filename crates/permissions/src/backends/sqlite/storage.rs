//! Storage trait implementations for SQLite.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::core::{
    HierarchyRepository, HierarchyWriter, NodeHierarchy, PermissionStore, SnapshotRepository,
};
use crate::error::{BackendError, HierarchyError, PermissionError, PermissionResult, ScopeError};
use crate::types::{
    group_assignments, AssignmentFilter, AssignmentMap, CountingCircleAssignment,
    CountingCircleId, Node, NodeId, PermissionEntry, RebuildScope, SnapshotAssignment,
    SnapshotNode, Validity,
};

use super::SqliteBackend;

const NODE_COLUMNS: &str = "id, name, parent_id, owner_tenant_id, type";
const ASSIGNMENT_COLUMNS: &str =
    "doi_id, counting_circle_id, counting_circle_name, responsible_tenant_id";

fn internal_error(message: String) -> PermissionError {
    PermissionError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message,
        source: None,
    })
}

fn serialization_error(message: String) -> PermissionError {
    PermissionError::Backend(BackendError::SerializationError { message })
}

/// Fixed-width RFC 3339 so that text comparison in SQL orders instants.
fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_instant(value: &str) -> PermissionResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| serialization_error(format!("Invalid timestamp '{}': {}", value, e)))
}

fn parse_node_id(value: &str) -> PermissionResult<NodeId> {
    value.parse().map_err(|e| {
        serialization_error(format!("Invalid domain of influence id '{}': {}", value, e))
    })
}

fn parse_counting_circle_id(value: &str) -> PermissionResult<CountingCircleId> {
    value
        .parse()
        .map_err(|e| serialization_error(format!("Invalid counting circle id '{}': {}", value, e)))
}

/// Encodes ids as one JSON array parameter, expanded in SQL with `json_each`.
fn json_array<'a>(ids: impl IntoIterator<Item = &'a str>) -> PermissionResult<String> {
    Ok(serde_json::to_string(&ids.into_iter().collect::<Vec<_>>())?)
}

/// Builds `doi_id IN (..) OR tenant_id IN (..)` for a bounded scope.
///
/// Each filter binds a single JSON array, so the statement size does not
/// depend on the number of ids in scope.
fn scope_clause(scope: &RebuildScope) -> PermissionResult<(String, Vec<String>)> {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if !scope.node_ids.is_empty() {
        let node_ids: Vec<String> = scope.node_ids.iter().map(|id| id.to_string()).collect();
        values.push(json_array(node_ids.iter().map(String::as_str))?);
        conditions.push(format!(
            "doi_id IN (SELECT value FROM json_each(?{}))",
            values.len()
        ));
    }
    if !scope.tenant_ids.is_empty() {
        values.push(json_array(scope.tenant_ids.iter().map(|id| id.as_str()))?);
        conditions.push(format!(
            "tenant_id IN (SELECT value FROM json_each(?{}))",
            values.len()
        ));
    }

    Ok((conditions.join(" OR "), values))
}

struct NodeRow {
    id: String,
    name: String,
    parent_id: Option<String>,
    owner: String,
    kind: String,
}

impl NodeRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            parent_id: row.get(2)?,
            owner: row.get(3)?,
            kind: row.get(4)?,
        })
    }

    fn into_node(self) -> PermissionResult<Node> {
        Ok(Node {
            id: parse_node_id(&self.id)?,
            name: self.name,
            parent_id: self.parent_id.as_deref().map(parse_node_id).transpose()?,
            owner: self.owner.into(),
            kind: self.kind.parse().map_err(serialization_error)?,
        })
    }
}

struct AssignmentRow {
    node_id: String,
    counting_circle_id: String,
    counting_circle_name: String,
    responsible_tenant: String,
}

impl AssignmentRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            node_id: row.get(0)?,
            counting_circle_id: row.get(1)?,
            counting_circle_name: row.get(2)?,
            responsible_tenant: row.get(3)?,
        })
    }

    fn into_assignment(self) -> PermissionResult<CountingCircleAssignment> {
        Ok(CountingCircleAssignment {
            node_id: parse_node_id(&self.node_id)?,
            counting_circle_id: parse_counting_circle_id(&self.counting_circle_id)?,
            counting_circle_name: self.counting_circle_name,
            responsible_tenant: self.responsible_tenant.into(),
        })
    }
}

struct ValidityRow {
    valid_from: String,
    valid_to: Option<String>,
    deleted: bool,
}

impl ValidityRow {
    /// Reads the three validity columns starting at `offset`.
    fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            valid_from: row.get(offset)?,
            valid_to: row.get(offset + 1)?,
            deleted: row.get(offset + 2)?,
        })
    }

    fn into_validity(self) -> PermissionResult<(Validity, bool)> {
        let validity = Validity {
            valid_from: parse_instant(&self.valid_from)?,
            valid_to: self.valid_to.as_deref().map(parse_instant).transpose()?,
        };
        Ok((validity, self.deleted))
    }
}

struct EntryRow {
    tenant_id: String,
    node_id: String,
    is_parent: bool,
    counting_circle_ids: String,
}

impl EntryRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            tenant_id: row.get(0)?,
            node_id: row.get(1)?,
            is_parent: row.get(2)?,
            counting_circle_ids: row.get(3)?,
        })
    }

    fn into_entry(self) -> PermissionResult<PermissionEntry> {
        let circle_ids: Vec<String> = serde_json::from_str(&self.counting_circle_ids)?;
        Ok(PermissionEntry {
            tenant_id: self.tenant_id.into(),
            node_id: parse_node_id(&self.node_id)?,
            is_parent: self.is_parent,
            counting_circle_ids: circle_ids
                .iter()
                .map(|id| parse_counting_circle_id(id))
                .collect::<PermissionResult<_>>()?,
        })
    }
}

fn node_exists(conn: &Connection, node_id: &NodeId) -> PermissionResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM domain_of_influences WHERE id = ?1",
            [node_id.to_string()],
            |_| Ok(()),
        )
        .optional()
        .map_err(|e| internal_error(format!("Failed to look up domain of influence: {}", e)))?;
    Ok(found.is_some())
}

fn load_node(conn: &Connection, node_id: &NodeId) -> PermissionResult<Option<Node>> {
    conn.query_row(
        &format!("SELECT {} FROM domain_of_influences WHERE id = ?1", NODE_COLUMNS),
        [node_id.to_string()],
        NodeRow::read,
    )
    .optional()
    .map_err(|e| internal_error(format!("Failed to read domain of influence: {}", e)))?
    .map(NodeRow::into_node)
    .transpose()
}

fn ancestor_ids(conn: &Connection, node_id: &NodeId) -> PermissionResult<Vec<NodeId>> {
    let mut stmt = conn
        .prepare(
            "WITH RECURSIVE chain(id, parent_id) AS (
                SELECT id, parent_id FROM domain_of_influences WHERE id = ?1
                UNION
                SELECT d.id, d.parent_id FROM domain_of_influences d
                    JOIN chain c ON d.id = c.parent_id
            )
            SELECT id, parent_id FROM chain",
        )
        .map_err(|e| internal_error(format!("Failed to prepare ancestor query: {}", e)))?;
    let rows = stmt
        .query_map([node_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })
        .map_err(|e| internal_error(format!("Failed to query ancestors: {}", e)))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| internal_error(format!("Failed to read ancestors: {}", e)))?;

    let mut parents = HashMap::with_capacity(rows.len());
    for (id, parent_id) in rows {
        parents.insert(
            parse_node_id(&id)?,
            parent_id.as_deref().map(parse_node_id).transpose()?,
        );
    }

    let mut ancestors = Vec::new();
    let mut seen = BTreeSet::from([*node_id]);
    let mut current = parents.get(node_id).copied().flatten();
    while let Some(parent_id) = current {
        if !parents.contains_key(&parent_id) {
            break;
        }
        if !seen.insert(parent_id) {
            return Err(HierarchyError::Cycle { node_id: parent_id }.into());
        }
        ancestors.push(parent_id);
        current = parents.get(&parent_id).copied().flatten();
    }
    Ok(ancestors)
}

fn descendant_ids(conn: &Connection, node_id: &NodeId) -> PermissionResult<Vec<NodeId>> {
    let mut stmt = conn
        .prepare(
            "WITH RECURSIVE subtree(id) AS (
                SELECT id FROM domain_of_influences WHERE parent_id = ?1
                UNION
                SELECT d.id FROM domain_of_influences d JOIN subtree s ON d.parent_id = s.id
            )
            SELECT id FROM subtree WHERE id <> ?1",
        )
        .map_err(|e| internal_error(format!("Failed to prepare descendant query: {}", e)))?;
    let ids = stmt
        .query_map([node_id.to_string()], |row| row.get::<_, String>(0))
        .map_err(|e| internal_error(format!("Failed to query descendants: {}", e)))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| internal_error(format!("Failed to read descendants: {}", e)))?;

    let mut descendants = ids
        .iter()
        .map(|id| parse_node_id(id))
        .collect::<PermissionResult<Vec<_>>>()?;
    descendants.sort();
    Ok(descendants)
}

fn node_assignments(
    conn: &Connection,
    node_id: &NodeId,
) -> PermissionResult<Vec<CountingCircleAssignment>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM doi_counting_circles WHERE doi_id = ?1",
            ASSIGNMENT_COLUMNS
        ))
        .map_err(|e| internal_error(format!("Failed to prepare assignment query: {}", e)))?;
    let rows = stmt
        .query_map([node_id.to_string()], AssignmentRow::read)
        .map_err(|e| internal_error(format!("Failed to query assignments: {}", e)))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| internal_error(format!("Failed to read assignments: {}", e)))?;
    rows.into_iter().map(AssignmentRow::into_assignment).collect()
}

fn insert_node_version(
    conn: &Connection,
    node: &Node,
    at: DateTime<Utc>,
    deleted: bool,
) -> PermissionResult<()> {
    let at = format_instant(at);
    conn.execute(
        "UPDATE doi_snapshots SET valid_to = ?2 WHERE id = ?1 AND valid_to IS NULL",
        params![node.id.to_string(), at],
    )
    .map_err(|e| internal_error(format!("Failed to close domain of influence version: {}", e)))?;
    conn.execute(
        &format!(
            "INSERT INTO doi_snapshots ({}, valid_from, valid_to, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7)",
            NODE_COLUMNS
        ),
        params![
            node.id.to_string(),
            node.name,
            node.parent_id.map(|id| id.to_string()),
            node.owner.as_str(),
            node.kind.as_str(),
            at,
            deleted,
        ],
    )
    .map_err(|e| internal_error(format!("Failed to insert domain of influence version: {}", e)))?;
    Ok(())
}

fn insert_assignment_version(
    conn: &Connection,
    assignment: &CountingCircleAssignment,
    at: DateTime<Utc>,
    deleted: bool,
) -> PermissionResult<()> {
    let at = format_instant(at);
    conn.execute(
        "UPDATE doi_cc_snapshots SET valid_to = ?3
         WHERE doi_id = ?1 AND counting_circle_id = ?2 AND valid_to IS NULL",
        params![
            assignment.node_id.to_string(),
            assignment.counting_circle_id.to_string(),
            at
        ],
    )
    .map_err(|e| internal_error(format!("Failed to close assignment version: {}", e)))?;
    conn.execute(
        &format!(
            "INSERT INTO doi_cc_snapshots ({}, valid_from, valid_to, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
            ASSIGNMENT_COLUMNS
        ),
        params![
            assignment.node_id.to_string(),
            assignment.counting_circle_id.to_string(),
            assignment.counting_circle_name,
            assignment.responsible_tenant.as_str(),
            at,
            deleted,
        ],
    )
    .map_err(|e| internal_error(format!("Failed to insert assignment version: {}", e)))?;
    Ok(())
}

fn remove_assignment(
    conn: &Connection,
    assignment: &CountingCircleAssignment,
    at: DateTime<Utc>,
) -> PermissionResult<()> {
    conn.execute(
        "DELETE FROM doi_counting_circles WHERE doi_id = ?1 AND counting_circle_id = ?2",
        params![
            assignment.node_id.to_string(),
            assignment.counting_circle_id.to_string()
        ],
    )
    .map_err(|e| internal_error(format!("Failed to delete assignment: {}", e)))?;
    insert_assignment_version(conn, assignment, at, true)
}

fn insert_entries(conn: &Connection, entries: &[PermissionEntry]) -> PermissionResult<u64> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO doi_permissions (tenant_id, doi_id, is_parent, counting_circle_ids)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(|e| internal_error(format!("Failed to prepare permission insert: {}", e)))?;

    for entry in entries {
        let circles: Vec<String> = entry
            .counting_circle_ids
            .iter()
            .map(|id| id.to_string())
            .collect();
        stmt.execute(params![
            entry.tenant_id.as_str(),
            entry.node_id.to_string(),
            entry.is_parent,
            serde_json::to_string(&circles)?,
        ])
        .map_err(|e| internal_error(format!("Failed to insert permission entry: {}", e)))?;
    }
    Ok(entries.len() as u64)
}

#[async_trait]
impl HierarchyRepository for SqliteBackend {
    async fn load_all_nodes(&self) -> PermissionResult<Vec<Node>> {
        let conn = self.get_connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM domain_of_influences ORDER BY id",
                NODE_COLUMNS
            ))
            .map_err(|e| internal_error(format!("Failed to prepare node query: {}", e)))?;
        let rows = stmt
            .query_map([], NodeRow::read)
            .map_err(|e| internal_error(format!("Failed to query nodes: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| internal_error(format!("Failed to read nodes: {}", e)))?;
        rows.into_iter().map(NodeRow::into_node).collect()
    }

    async fn load_hierarchy(&self, node_id: NodeId) -> PermissionResult<NodeHierarchy> {
        let conn = self.get_connection()?;
        if !node_exists(&conn, &node_id)? {
            return Err(HierarchyError::NodeNotFound { node_id }.into());
        }
        Ok(NodeHierarchy {
            node_id,
            ancestor_ids: ancestor_ids(&conn, &node_id)?,
            descendant_ids: descendant_ids(&conn, &node_id)?,
        })
    }

    async fn load_assignments(&self, filter: &AssignmentFilter) -> PermissionResult<AssignmentMap> {
        let (clause, values): (String, Vec<String>) = match filter {
            AssignmentFilter::All => (String::new(), Vec::new()),
            AssignmentFilter::CountingCircle(id) => (
                "WHERE counting_circle_id = ?1".to_string(),
                vec![id.to_string()],
            ),
            AssignmentFilter::Nodes(ids) if ids.is_empty() => return Ok(AssignmentMap::new()),
            AssignmentFilter::Nodes(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                (
                    "WHERE doi_id IN (SELECT value FROM json_each(?1))".to_string(),
                    vec![json_array(ids.iter().map(String::as_str))?],
                )
            }
        };

        let conn = self.get_connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM doi_counting_circles {} ORDER BY doi_id, counting_circle_id",
                ASSIGNMENT_COLUMNS, clause
            ))
            .map_err(|e| internal_error(format!("Failed to prepare assignment query: {}", e)))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), AssignmentRow::read)
            .map_err(|e| internal_error(format!("Failed to query assignments: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| internal_error(format!("Failed to read assignments: {}", e)))?;

        let assignments = rows
            .into_iter()
            .map(AssignmentRow::into_assignment)
            .collect::<PermissionResult<Vec<_>>>()?;
        Ok(group_assignments(assignments))
    }
}

#[async_trait]
impl PermissionStore for SqliteBackend {
    async fn replace_all(&self, entries: Vec<PermissionEntry>) -> PermissionResult<u64> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;

        let deleted = tx
            .execute("DELETE FROM doi_permissions", [])
            .map_err(|e| internal_error(format!("Failed to clear permissions: {}", e)))?;
        insert_entries(&tx, &entries)?;

        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit permissions: {}", e)))?;
        Ok(deleted as u64)
    }

    async fn delete_where(&self, scope: &RebuildScope) -> PermissionResult<u64> {
        if scope.is_unbounded() {
            return Err(ScopeError::Unbounded {
                operation: "permission delete".to_string(),
            }
            .into());
        }

        let (clause, values) = scope_clause(scope)?;
        let conn = self.get_connection()?;
        let deleted = conn
            .execute(
                &format!("DELETE FROM doi_permissions WHERE {}", clause),
                params_from_iter(values.iter()),
            )
            .map_err(|e| internal_error(format!("Failed to delete permissions: {}", e)))?;
        Ok(deleted as u64)
    }

    async fn insert(&self, entries: &[PermissionEntry]) -> PermissionResult<u64> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        let inserted = insert_entries(&tx, entries)?;
        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit permissions: {}", e)))?;
        Ok(inserted)
    }

    async fn load_entries(
        &self,
        scope: Option<&RebuildScope>,
    ) -> PermissionResult<Vec<PermissionEntry>> {
        let (clause, values) = match scope {
            Some(scope) if scope.is_unbounded() => return Ok(Vec::new()),
            Some(scope) => {
                let (clause, values) = scope_clause(scope)?;
                (format!("WHERE {}", clause), values)
            }
            None => (String::new(), Vec::new()),
        };

        let conn = self.get_connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT tenant_id, doi_id, is_parent, counting_circle_ids
                 FROM doi_permissions {} ORDER BY tenant_id, doi_id",
                clause
            ))
            .map_err(|e| internal_error(format!("Failed to prepare permission query: {}", e)))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), EntryRow::read)
            .map_err(|e| internal_error(format!("Failed to query permissions: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| internal_error(format!("Failed to read permissions: {}", e)))?;
        rows.into_iter().map(EntryRow::into_entry).collect()
    }
}

#[async_trait]
impl SnapshotRepository for SqliteBackend {
    async fn load_nodes_at(
        &self,
        at: DateTime<Utc>,
        include_deleted: bool,
    ) -> PermissionResult<Vec<SnapshotNode>> {
        let conn = self.get_connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {}, valid_from, valid_to, deleted FROM doi_snapshots
                 WHERE valid_from <= ?1 AND (valid_to IS NULL OR valid_to > ?1)
                   AND (?2 = 1 OR deleted = 0)
                 ORDER BY id",
                NODE_COLUMNS
            ))
            .map_err(|e| internal_error(format!("Failed to prepare snapshot query: {}", e)))?;
        let rows = stmt
            .query_map(params![format_instant(at), include_deleted], |row| {
                Ok((NodeRow::read(row)?, ValidityRow::read(row, 5)?))
            })
            .map_err(|e| internal_error(format!("Failed to query node snapshots: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| internal_error(format!("Failed to read node snapshots: {}", e)))?;

        rows.into_iter()
            .map(|(node, validity)| {
                let (validity, deleted) = validity.into_validity()?;
                Ok(SnapshotNode {
                    node: node.into_node()?,
                    validity,
                    deleted,
                })
            })
            .collect()
    }

    async fn load_assignments_at(
        &self,
        at: DateTime<Utc>,
        include_deleted: bool,
    ) -> PermissionResult<Vec<SnapshotAssignment>> {
        let conn = self.get_connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {}, valid_from, valid_to, deleted FROM doi_cc_snapshots
                 WHERE valid_from <= ?1 AND (valid_to IS NULL OR valid_to > ?1)
                   AND (?2 = 1 OR deleted = 0)
                 ORDER BY doi_id, counting_circle_id",
                ASSIGNMENT_COLUMNS
            ))
            .map_err(|e| internal_error(format!("Failed to prepare snapshot query: {}", e)))?;
        let rows = stmt
            .query_map(params![format_instant(at), include_deleted], |row| {
                Ok((AssignmentRow::read(row)?, ValidityRow::read(row, 4)?))
            })
            .map_err(|e| internal_error(format!("Failed to query assignment snapshots: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| internal_error(format!("Failed to read assignment snapshots: {}", e)))?;

        rows.into_iter()
            .map(|(assignment, validity)| {
                let (validity, deleted) = validity.into_validity()?;
                Ok(SnapshotAssignment {
                    assignment: assignment.into_assignment()?,
                    validity,
                    deleted,
                })
            })
            .collect()
    }
}

#[async_trait]
impl HierarchyWriter for SqliteBackend {
    async fn save_node(&self, node: &Node, at: DateTime<Utc>) -> PermissionResult<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT INTO domain_of_influences ({}) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    parent_id = excluded.parent_id,
                    owner_tenant_id = excluded.owner_tenant_id,
                    type = excluded.type",
                NODE_COLUMNS
            ),
            params![
                node.id.to_string(),
                node.name,
                node.parent_id.map(|id| id.to_string()),
                node.owner.as_str(),
                node.kind.as_str(),
            ],
        )
        .map_err(|e| internal_error(format!("Failed to save domain of influence: {}", e)))?;
        insert_node_version(&tx, node, at, false)?;

        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit domain of influence: {}", e)))?;
        Ok(())
    }

    async fn delete_node(&self, node_id: NodeId, at: DateTime<Utc>) -> PermissionResult<Vec<NodeId>> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;

        if !node_exists(&tx, &node_id)? {
            return Err(HierarchyError::NodeNotFound { node_id }.into());
        }
        let mut removed = vec![node_id];
        removed.extend(descendant_ids(&tx, &node_id)?);

        for id in &removed {
            for assignment in node_assignments(&tx, id)? {
                remove_assignment(&tx, &assignment, at)?;
            }
            if let Some(node) = load_node(&tx, id)? {
                tx.execute(
                    "DELETE FROM domain_of_influences WHERE id = ?1",
                    [id.to_string()],
                )
                .map_err(|e| internal_error(format!("Failed to delete domain of influence: {}", e)))?;
                insert_node_version(&tx, &node, at, true)?;
            }
        }

        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit deletion: {}", e)))?;
        Ok(removed)
    }

    async fn save_assignment(
        &self,
        assignment: &CountingCircleAssignment,
        at: DateTime<Utc>,
    ) -> PermissionResult<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;

        if !node_exists(&tx, &assignment.node_id)? {
            return Err(HierarchyError::NodeNotFound {
                node_id: assignment.node_id,
            }
            .into());
        }
        tx.execute(
            &format!(
                "INSERT INTO doi_counting_circles ({}) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(doi_id, counting_circle_id) DO UPDATE SET
                    counting_circle_name = excluded.counting_circle_name,
                    responsible_tenant_id = excluded.responsible_tenant_id",
                ASSIGNMENT_COLUMNS
            ),
            params![
                assignment.node_id.to_string(),
                assignment.counting_circle_id.to_string(),
                assignment.counting_circle_name,
                assignment.responsible_tenant.as_str(),
            ],
        )
        .map_err(|e| internal_error(format!("Failed to save assignment: {}", e)))?;
        insert_assignment_version(&tx, assignment, at, false)?;

        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit assignment: {}", e)))?;
        Ok(())
    }

    async fn delete_assignment(
        &self,
        node_id: NodeId,
        counting_circle_id: CountingCircleId,
        at: DateTime<Utc>,
    ) -> PermissionResult<bool> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;

        let existing = tx
            .query_row(
                &format!(
                    "SELECT {} FROM doi_counting_circles
                     WHERE doi_id = ?1 AND counting_circle_id = ?2",
                    ASSIGNMENT_COLUMNS
                ),
                params![node_id.to_string(), counting_circle_id.to_string()],
                AssignmentRow::read,
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read assignment: {}", e)))?;
        let Some(row) = existing else {
            return Ok(false);
        };

        remove_assignment(&tx, &row.into_assignment()?, at)?;
        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit assignment removal: {}", e)))?;
        Ok(true)
    }
}
