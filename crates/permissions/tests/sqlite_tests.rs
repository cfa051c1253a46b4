//! SQLite backend integration tests.
//!
//! These run the rebuild scenarios end to end against an in-memory database
//! and a file-backed one.

#![cfg(feature = "sqlite")]

mod common;

use std::sync::Arc;

use basis_permissions::backends::sqlite::{SqliteBackend, SqliteBackendConfig};
use basis_permissions::core::{
    HierarchyRepository, HierarchyWriter, PermissionStore, SnapshotRepository,
};
use basis_permissions::error::{HierarchyError, PermissionError};
use basis_permissions::types::{
    AssignmentFilter, CountingCircleAssignment, DomainOfInfluenceType, Node, NodeId,
    PermissionEntry, RebuildScope,
};
use basis_permissions::RebuildOrchestrator;

use common::*;

fn create_backend() -> Arc<SqliteBackend> {
    init_tracing();
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    Arc::new(backend)
}

async fn persisted(backend: &SqliteBackend) -> Vec<PermissionEntry> {
    backend.load_entries(None).await.unwrap()
}

// ============================================================================
// Hierarchy Tests
// ============================================================================

#[tokio::test]
async fn test_load_hierarchy_through_levels() {
    let backend = create_backend();
    let canton = CantonFixture::new();
    canton.seed(backend.as_ref(), at(1)).await.unwrap();

    let hierarchy = backend.load_hierarchy(canton.gossau.id).await.unwrap();
    assert_eq!(hierarchy.ancestor_ids, vec![canton.north.id, canton.canton.id]);
    assert!(hierarchy.descendant_ids.is_empty());

    let hierarchy = backend.load_hierarchy(canton.canton.id).await.unwrap();
    let mut expected = vec![
        canton.north.id,
        canton.south.id,
        canton.andwil.id,
        canton.gossau.id,
        canton.wil.id,
    ];
    expected.sort();
    assert_eq!(hierarchy.descendant_ids, expected);
}

#[tokio::test]
async fn test_load_assignments_by_filter() {
    let backend = create_backend();
    let canton = CantonFixture::new();
    canton.seed(backend.as_ref(), at(1)).await.unwrap();

    let all = backend.load_assignments(&AssignmentFilter::All).await.unwrap();
    assert_eq!(all.values().map(Vec::len).sum::<usize>(), 4);

    let shared = backend
        .load_assignments(&AssignmentFilter::CountingCircle(canton.shared_circle))
        .await
        .unwrap();
    assert_eq!(shared.len(), 2);
    assert!(shared.contains_key(&canton.gossau.id));
    assert!(shared.contains_key(&canton.wil.id));

    let gossau = backend
        .load_assignments(&AssignmentFilter::Nodes(vec![canton.gossau.id]))
        .await
        .unwrap();
    assert_eq!(gossau[&canton.gossau.id].len(), 2);

    let none = backend
        .load_assignments(&AssignmentFilter::Nodes(vec![]))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_delete_node_cascades() {
    let backend = create_backend();
    let canton = CantonFixture::new();
    canton.seed(backend.as_ref(), at(1)).await.unwrap();

    let removed = backend.delete_node(canton.north.id, at(2)).await.unwrap();
    assert_eq!(removed[0], canton.north.id);
    assert_eq!(removed.len(), 3);

    let nodes = backend.load_all_nodes().await.unwrap();
    assert_eq!(nodes.len(), 3);
    let links = backend.load_assignments(&AssignmentFilter::All).await.unwrap();
    assert_eq!(links.keys().copied().collect::<Vec<_>>(), vec![canton.wil.id]);

    let err = backend.delete_node(canton.north.id, at(3)).await.unwrap_err();
    assert!(matches!(
        err,
        PermissionError::Hierarchy(HierarchyError::NodeNotFound { .. })
    ));
}

#[tokio::test]
async fn test_node_history() {
    let backend = create_backend();
    let node = Node::new("Town", "t", DomainOfInfluenceType::Mu);
    backend.save_node(&node, at(1)).await.unwrap();
    let renamed = Node {
        name: "City".to_string(),
        ..node.clone()
    };
    backend.save_node(&renamed, at(3)).await.unwrap();
    backend.delete_node(node.id, at(5)).await.unwrap();

    let at_two = backend.load_nodes_at(at(2), false).await.unwrap();
    assert_eq!(at_two[0].node.name, "Town");
    assert_eq!(at_two[0].validity.valid_to, Some(at(3)));

    let at_four = backend.load_nodes_at(at(4), false).await.unwrap();
    assert_eq!(at_four[0].node.name, "City");

    assert!(backend.load_nodes_at(at(6), false).await.unwrap().is_empty());
    let tombstones = backend.load_nodes_at(at(6), true).await.unwrap();
    assert_eq!(tombstones.len(), 1);
    assert!(tombstones[0].deleted);
    assert!(tombstones[0].validity.is_current());
}

// ============================================================================
// Permission Store Tests
// ============================================================================

#[tokio::test]
async fn test_delete_where_matches_node_or_tenant() {
    let backend = create_backend();
    let n1 = NodeId::new();
    let n2 = NodeId::new();
    backend
        .insert(&[
            PermissionEntry::parent_stub(tenant("a"), n1),
            PermissionEntry::parent_stub(tenant("b"), n1),
            PermissionEntry::parent_stub(tenant("b"), n2),
            PermissionEntry::parent_stub(tenant("c"), n2),
        ])
        .await
        .unwrap();

    let scope = RebuildScope::nodes([n1]).with_tenants([tenant("c")]);
    assert_eq!(backend.delete_where(&scope).await.unwrap(), 3);
    assert_eq!(
        persisted(&backend).await,
        vec![PermissionEntry::parent_stub(tenant("b"), n2)]
    );
}

#[tokio::test]
async fn test_load_entries_by_scope() {
    let backend = create_backend();
    let scenario = ScenarioA::new();
    backend.insert(&scenario.expected()).await.unwrap();

    let scope = RebuildScope::tenants([tenant("Z")]);
    let loaded = backend.load_entries(Some(&scope)).await.unwrap();
    assert_eq!(loaded, in_scope(&scenario.expected(), &scope));
    assert_eq!(loaded.len(), 2);
}

// ============================================================================
// Rebuild Tests
// ============================================================================

#[tokio::test]
async fn test_scenario_a_and_b() {
    let backend = create_backend();
    let scenario = ScenarioA::new();
    scenario.seed(backend.as_ref(), at(1)).await.unwrap();
    let orchestrator = RebuildOrchestrator::from_backend(backend.clone());

    orchestrator.full_rebuild().await.unwrap();
    assert_eq!(persisted(&backend).await, scenario.expected());

    let reassigned = CountingCircleAssignment {
        responsible_tenant: tenant("W"),
        ..scenario.assignment.clone()
    };
    backend.save_assignment(&reassigned, at(2)).await.unwrap();
    orchestrator
        .on_counting_circle_assignment_changed(scenario.circle(), &[tenant("Z")])
        .await
        .unwrap();

    let after = persisted(&backend).await;
    assert!(after.iter().all(|entry| entry.tenant_id.as_str() != "Z"));
    assert_eq!(
        after.iter().filter(|entry| entry.tenant_id.as_str() == "W").count(),
        2
    );

    // The snapshot before the reassignment still shows Z.
    assert_eq!(
        orchestrator.snapshot(at(1), false, false).await.unwrap(),
        scenario.expected()
    );
}

#[tokio::test]
async fn test_node_created_and_moved() {
    let backend = create_backend();
    let canton = CantonFixture::new();
    canton.seed(backend.as_ref(), at(1)).await.unwrap();
    let orchestrator = RebuildOrchestrator::from_backend(backend.clone());
    orchestrator.full_rebuild().await.unwrap();

    let created = Node::new("Niederwil", "niederwil", DomainOfInfluenceType::Sk)
        .with_parent(canton.andwil.id);
    backend.save_node(&created, at(2)).await.unwrap();
    orchestrator.on_node_created(&created).await.unwrap();

    let moved = created.clone().with_parent(canton.wil.id);
    backend.save_node(&moved, at(3)).await.unwrap();
    orchestrator
        .on_hierarchy_changed(moved.id, &[])
        .await
        .unwrap();
    let scoped = persisted(&backend).await;

    orchestrator.full_rebuild().await.unwrap();
    assert_eq!(scoped, persisted(&backend).await);
}

#[tokio::test]
async fn test_file_backend_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permissions.db");
    let scenario = ScenarioA::new();

    {
        let backend = Arc::new(SqliteBackend::open(&path).unwrap());
        backend.init_schema().unwrap();
        scenario.seed(backend.as_ref(), at(1)).await.unwrap();
        RebuildOrchestrator::from_backend(backend)
            .full_rebuild()
            .await
            .unwrap();
    }

    let config = SqliteBackendConfig {
        max_connections: 2,
        ..Default::default()
    };
    let backend = SqliteBackend::with_config(&path, config).unwrap();
    backend.init_schema().unwrap();
    assert!(!backend.is_memory());
    assert!(backend.health_check().is_ok());
    assert_eq!(persisted(&backend).await, scenario.expected());
}
