//! Hierarchy fixtures.

use chrono::{DateTime, TimeZone, Utc};

use basis_permissions::core::HierarchyWriter;
use basis_permissions::error::PermissionResult;
use basis_permissions::tenant::TenantId;
use basis_permissions::types::{
    CountingCircleAssignment, CountingCircleId, DomainOfInfluenceType, Node, PermissionEntry,
    RebuildScope,
};

/// Instant on the given day of May 2024, 08:00 UTC.
pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, 8, 0, 0).unwrap()
}

/// Shorthand for a tenant id.
pub fn tenant(id: &str) -> TenantId {
    TenantId::new(id)
}

/// Sorts entries by `(tenant, node)`, the order stores return them in.
pub fn sorted(mut entries: Vec<PermissionEntry>) -> Vec<PermissionEntry> {
    entries.sort_by_key(PermissionEntry::key);
    entries
}

/// Keeps only the entries a scope covers.
pub fn in_scope(entries: &[PermissionEntry], scope: &RebuildScope) -> Vec<PermissionEntry> {
    entries
        .iter()
        .filter(|entry| scope.contains_entry(entry))
        .cloned()
        .collect()
}

/// Root `R` owned by `X`, child `C` owned by `Y`, and counting circle `K1`
/// linked to `C` with `Z` responsible.
#[derive(Debug, Clone)]
pub struct ScenarioA {
    /// Root node.
    pub root: Node,
    /// Child node.
    pub child: Node,
    /// Link of `K1` to the child.
    pub assignment: CountingCircleAssignment,
}

impl ScenarioA {
    /// Creates the fixture with fresh ids.
    pub fn new() -> Self {
        let root = Node::new("R", "X", DomainOfInfluenceType::Ct);
        let child = Node::new("C", "Y", DomainOfInfluenceType::Mu).with_parent(root.id);
        let assignment =
            CountingCircleAssignment::new(child.id, CountingCircleId::new(), "K1", "Z");
        Self {
            root,
            child,
            assignment,
        }
    }

    /// The counting circle id of `K1`.
    pub fn circle(&self) -> CountingCircleId {
        self.assignment.counting_circle_id
    }

    /// Writes nodes and the assignment.
    pub async fn seed<W: HierarchyWriter + ?Sized>(
        &self,
        writer: &W,
        at: DateTime<Utc>,
    ) -> PermissionResult<()> {
        writer.save_node(&self.root, at).await?;
        writer.save_node(&self.child, at).await?;
        writer.save_assignment(&self.assignment, at).await
    }

    /// The complete permission table for this fixture.
    pub fn expected(&self) -> Vec<PermissionEntry> {
        let k1 = self.circle();
        sorted(vec![
            PermissionEntry::new(tenant("X"), self.root.id, false, vec![]),
            PermissionEntry::new(tenant("Y"), self.child.id, false, vec![k1]),
            PermissionEntry::parent_stub(tenant("Y"), self.root.id),
            PermissionEntry::new(tenant("Z"), self.child.id, true, vec![k1]),
            PermissionEntry::parent_stub(tenant("Z"), self.root.id),
        ])
    }
}

impl Default for ScenarioA {
    fn default() -> Self {
        Self::new()
    }
}

/// A canton with two districts and three municipalities.
///
/// ```text
/// Canton (canton)
/// ├── District North (north)
/// │   ├── Andwil (andwil)          K-Andwil -> andwil
/// │   └── Gossau (gossau)          K-Gossau -> gossau, K-Shared -> north
/// └── District South (canton)
///     └── Wil (wil)                K-Shared -> wil
/// ```
#[derive(Debug, Clone)]
pub struct CantonFixture {
    /// Canton root.
    pub canton: Node,
    /// Northern district.
    pub north: Node,
    /// Southern district, owned by the canton.
    pub south: Node,
    /// Municipality in the north.
    pub andwil: Node,
    /// Municipality in the north.
    pub gossau: Node,
    /// Municipality in the south.
    pub wil: Node,
    /// Circle linked to two municipalities with different responsible tenants.
    pub shared_circle: CountingCircleId,
    /// All counting circle links.
    pub assignments: Vec<CountingCircleAssignment>,
}

impl CantonFixture {
    /// Creates the fixture with fresh ids.
    pub fn new() -> Self {
        let canton = Node::new("Canton", "canton", DomainOfInfluenceType::Ct);
        let north = Node::new("District North", "north", DomainOfInfluenceType::Bz)
            .with_parent(canton.id);
        let south = Node::new("District South", "canton", DomainOfInfluenceType::Bz)
            .with_parent(canton.id);
        let andwil =
            Node::new("Andwil", "andwil", DomainOfInfluenceType::Mu).with_parent(north.id);
        let gossau =
            Node::new("Gossau", "gossau", DomainOfInfluenceType::Mu).with_parent(north.id);
        let wil = Node::new("Wil", "wil", DomainOfInfluenceType::Mu).with_parent(south.id);

        let shared_circle = CountingCircleId::new();
        let assignments = vec![
            CountingCircleAssignment::new(andwil.id, CountingCircleId::new(), "K-Andwil", "andwil"),
            CountingCircleAssignment::new(gossau.id, CountingCircleId::new(), "K-Gossau", "gossau"),
            CountingCircleAssignment::new(gossau.id, shared_circle, "K-Shared", "north"),
            CountingCircleAssignment::new(wil.id, shared_circle, "K-Shared", "wil"),
        ];

        Self {
            canton,
            north,
            south,
            andwil,
            gossau,
            wil,
            shared_circle,
            assignments,
        }
    }

    /// All nodes, parents before children.
    pub fn nodes(&self) -> Vec<Node> {
        vec![
            self.canton.clone(),
            self.north.clone(),
            self.south.clone(),
            self.andwil.clone(),
            self.gossau.clone(),
            self.wil.clone(),
        ]
    }

    /// Writes nodes and assignments.
    pub async fn seed<W: HierarchyWriter + ?Sized>(
        &self,
        writer: &W,
        at: DateTime<Utc>,
    ) -> PermissionResult<()> {
        for node in self.nodes() {
            writer.save_node(&node, at).await?;
        }
        for assignment in &self.assignments {
            writer.save_assignment(assignment, at).await?;
        }
        Ok(())
    }
}

impl Default for CantonFixture {
    fn default() -> Self {
        Self::new()
    }
}
