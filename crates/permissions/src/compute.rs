//! Per-tenant permission computation over a [`Forest`].
//!
//! For one tenant, the forest is walked depth-first in pre-order carrying a
//! flag telling whether the tenant has direct access to the parent:
//!
//! 1. The tenant has direct access to a node it owns, and to every node below
//!    a node it has direct access to.
//! 2. Counting circles at a node are visible with direct access, or when the
//!    tenant is responsible for the circle.
//! 3. A node with direct access or visible circles gets an entry
//!    (`is_parent = !direct`), and every ancestor without an entry gets an
//!    ancestor stub. The climb stops at the first ancestor that already has
//!    one, since the pre-order walk guarantees everything above it is present.
//!
//! A node's own entry is an unconditional upsert. Ancestor stubs are
//! insert-if-absent, so a stronger entry is never weakened.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::tenant::TenantId;
use crate::tree::Forest;
use crate::types::{CountingCircleId, NodeId, PermissionEntry};

/// Ordered collection of permission entries keyed by `(tenant, node)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionAccumulator {
    entries: BTreeMap<(TenantId, NodeId), PermissionEntry>,
}

impl PermissionAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up the entry for `(tenant, node)`.
    pub fn get(&self, tenant_id: &TenantId, node_id: &NodeId) -> Option<&PermissionEntry> {
        self.entries.get(&(tenant_id.clone(), *node_id))
    }

    /// Returns `true` if an entry exists for `(tenant, node)`.
    pub fn contains(&self, tenant_id: &TenantId, node_id: &NodeId) -> bool {
        self.get(tenant_id, node_id).is_some()
    }

    /// Inserts or replaces the entry for its key.
    pub fn upsert(&mut self, entry: PermissionEntry) {
        self.entries.insert(entry.key(), entry);
    }

    /// Inserts the entry unless its key is already present.
    ///
    /// Returns `true` if the entry was inserted.
    pub fn insert_if_absent(&mut self, entry: PermissionEntry) -> bool {
        match self.entries.entry(entry.key()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = &PermissionEntry> {
        self.entries.values()
    }

    /// Iterates the entries of one tenant in node order.
    pub fn for_tenant<'a>(
        &'a self,
        tenant_id: &'a TenantId,
    ) -> impl Iterator<Item = &'a PermissionEntry> + 'a {
        self.entries
            .values()
            .filter(move |entry| &entry.tenant_id == tenant_id)
    }

    /// Keeps only the entries matching the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&PermissionEntry) -> bool) {
        self.entries.retain(|_, entry| keep(entry));
    }

    /// Consumes the accumulator, returning entries in key order.
    pub fn into_entries(self) -> Vec<PermissionEntry> {
        self.entries.into_values().collect()
    }
}

impl FromIterator<PermissionEntry> for PermissionAccumulator {
    fn from_iter<I: IntoIterator<Item = PermissionEntry>>(iter: I) -> Self {
        let mut acc = Self::new();
        for entry in iter {
            acc.upsert(entry);
        }
        acc
    }
}

/// Computes permission entries for tenants over a forest.
#[derive(Debug, Clone, Copy)]
pub struct PermissionComputer<'a> {
    forest: &'a Forest,
}

impl<'a> PermissionComputer<'a> {
    /// Creates a computer over the given forest.
    pub fn new(forest: &'a Forest) -> Self {
        Self { forest }
    }

    /// Tenants that own at least one node or are responsible for at least
    /// one counting circle, in order.
    pub fn relevant_tenants(&self) -> BTreeSet<TenantId> {
        let mut tenants = BTreeSet::new();
        for idx in 0..self.forest.len() {
            tenants.insert(self.forest.node(idx).owner.clone());
            for circle in self.forest.counting_circles(idx) {
                tenants.insert(circle.responsible_tenant.clone());
            }
        }
        tenants
    }

    /// Computes the entries of one tenant into `acc`.
    pub fn compute_for_tenant(&self, tenant_id: &TenantId, acc: &mut PermissionAccumulator) {
        let forest = self.forest;
        let mut stack: Vec<(usize, bool)> =
            forest.roots().iter().rev().map(|&idx| (idx, false)).collect();

        while let Some((idx, has_access_to_parent)) = stack.pop() {
            let node = forest.node(idx);
            let has_direct_access = has_access_to_parent || &node.owner == tenant_id;

            let mut visible_circles: Vec<CountingCircleId> = Vec::new();
            for circle in forest.counting_circles(idx) {
                let visible = has_direct_access || &circle.responsible_tenant == tenant_id;
                if visible && !visible_circles.contains(&circle.id) {
                    visible_circles.push(circle.id);
                }
            }

            if has_direct_access || !visible_circles.is_empty() {
                acc.upsert(PermissionEntry::new(
                    tenant_id.clone(),
                    node.id,
                    !has_direct_access,
                    visible_circles,
                ));

                for ancestor in forest.ancestors(idx) {
                    let stub = PermissionEntry::parent_stub(tenant_id.clone(), forest.node(ancestor).id);
                    if !acc.insert_if_absent(stub) {
                        break;
                    }
                }
            }

            stack.extend(
                forest
                    .children(idx)
                    .iter()
                    .rev()
                    .map(|&child| (child, has_direct_access)),
            );
        }
    }

    /// Computes the entries of one tenant into a fresh accumulator.
    pub fn compute_tenant(&self, tenant_id: &TenantId) -> PermissionAccumulator {
        let mut acc = PermissionAccumulator::new();
        self.compute_for_tenant(tenant_id, &mut acc);
        acc
    }

    /// Computes the entries of the given tenants into one accumulator.
    pub fn compute_tenants<'t>(
        &self,
        tenants: impl IntoIterator<Item = &'t TenantId>,
    ) -> PermissionAccumulator {
        let mut acc = PermissionAccumulator::new();
        for tenant_id in tenants {
            self.compute_for_tenant(tenant_id, &mut acc);
        }
        acc
    }

    /// Computes the entries of every relevant tenant.
    pub fn compute_all(&self) -> PermissionAccumulator {
        let tenants = self.relevant_tenants();
        self.compute_tenants(&tenants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeBuilder;
    use crate::types::{
        group_assignments, CountingCircleAssignment, DomainOfInfluenceType, Node,
    };

    fn tenant(id: &str) -> TenantId {
        TenantId::new(id)
    }

    fn node(name: &str, owner: &str) -> Node {
        Node::new(name, owner, DomainOfInfluenceType::Mu)
    }

    #[test]
    fn test_scenario_circle_responsible_gets_parent_stubs() {
        let r = node("R", "X");
        let c = node("C", "Y").with_parent(r.id);
        let k1 = CountingCircleId::new();
        let map = group_assignments(vec![CountingCircleAssignment::new(c.id, k1, "K1", "Z")]);

        let forest = TreeBuilder::new(vec![r.clone(), c.clone()])
            .with_assignments(&map)
            .build()
            .unwrap();
        let acc = PermissionComputer::new(&forest).compute_all();

        let expected: PermissionAccumulator = vec![
            PermissionEntry::new(tenant("X"), r.id, false, vec![]),
            PermissionEntry::new(tenant("Y"), c.id, false, vec![k1]),
            PermissionEntry::new(tenant("Y"), r.id, true, vec![]),
            PermissionEntry::new(tenant("Z"), c.id, true, vec![k1]),
            PermissionEntry::new(tenant("Z"), r.id, true, vec![]),
        ]
        .into_iter()
        .collect();
        assert_eq!(acc, expected);
    }

    #[test]
    fn test_direct_access_is_inherited() {
        let root = node("Root", "owner");
        let mid = node("Mid", "other").with_parent(root.id);
        let leaf = node("Leaf", "other").with_parent(mid.id);

        let forest = TreeBuilder::new(vec![root.clone(), mid.clone(), leaf.clone()])
            .build()
            .unwrap();
        let acc = PermissionComputer::new(&forest).compute_tenant(&tenant("owner"));

        assert_eq!(acc.len(), 3);
        assert!(acc.iter().all(|entry| !entry.is_parent));
    }

    #[test]
    fn test_ancestor_stub_does_not_downgrade_direct_entry() {
        // A owns Root and Leaf; Mid belongs to someone else.
        let root = node("Root", "A");
        let mid = node("Mid", "B").with_parent(root.id);
        let leaf = node("Leaf", "A").with_parent(mid.id);

        let forest = TreeBuilder::new(vec![root.clone(), mid.clone(), leaf.clone()])
            .build()
            .unwrap();
        let acc = PermissionComputer::new(&forest).compute_tenant(&tenant("A"));

        assert!(!acc.get(&tenant("A"), &root.id).unwrap().is_parent);
        assert!(!acc.get(&tenant("A"), &mid.id).unwrap().is_parent);
        assert!(!acc.get(&tenant("A"), &leaf.id).unwrap().is_parent);
    }

    #[test]
    fn test_sibling_branch_gets_parent_stub_only_once() {
        let root = node("Root", "other");
        let left = node("Left", "T").with_parent(root.id);
        let right = node("Right", "T").with_parent(root.id);

        let forest = TreeBuilder::new(vec![root.clone(), left, right])
            .build()
            .unwrap();
        let acc = PermissionComputer::new(&forest).compute_tenant(&tenant("T"));

        assert_eq!(acc.len(), 3);
        assert!(acc.get(&tenant("T"), &root.id).unwrap().is_parent);
    }

    #[test]
    fn test_unrelated_tenant_sees_nothing() {
        let root = node("Root", "A");
        let forest = TreeBuilder::new(vec![root]).build().unwrap();
        let acc = PermissionComputer::new(&forest).compute_tenant(&tenant("nobody"));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_circles_deduplicated_and_filtered() {
        let root = node("Root", "owner");
        let k1 = CountingCircleId::new();
        let k2 = CountingCircleId::new();
        let map = group_assignments(vec![
            CountingCircleAssignment::new(root.id, k1, "K1", "resp"),
            CountingCircleAssignment::new(root.id, k1, "K1", "resp"),
            CountingCircleAssignment::new(root.id, k2, "K2", "someone-else"),
        ]);
        let forest = TreeBuilder::new(vec![root.clone()])
            .with_assignments(&map)
            .build()
            .unwrap();
        let computer = PermissionComputer::new(&forest);

        let resp = computer.compute_tenant(&tenant("resp"));
        assert_eq!(
            resp.get(&tenant("resp"), &root.id).unwrap().counting_circle_ids,
            vec![k1]
        );

        let owner = computer.compute_tenant(&tenant("owner"));
        assert_eq!(
            owner.get(&tenant("owner"), &root.id).unwrap().counting_circle_ids,
            vec![k1, k2]
        );
    }

    #[test]
    fn test_relevant_tenants() {
        let root = node("Root", "owner");
        let map = group_assignments(vec![CountingCircleAssignment::new(
            root.id,
            CountingCircleId::new(),
            "K",
            "resp",
        )]);
        let forest = TreeBuilder::new(vec![root])
            .with_assignments(&map)
            .build()
            .unwrap();

        let tenants: Vec<_> = PermissionComputer::new(&forest)
            .relevant_tenants()
            .into_iter()
            .collect();
        assert_eq!(tenants, vec![tenant("owner"), tenant("resp")]);
    }

    #[test]
    fn test_deterministic() {
        let root = node("Root", "A");
        let children: Vec<Node> = (0..20)
            .map(|i| node(&format!("Child {:02}", i), if i % 2 == 0 { "B" } else { "C" }).with_parent(root.id))
            .collect();
        let mut nodes = vec![root];
        nodes.extend(children);

        let forest = TreeBuilder::new(nodes.clone()).build().unwrap();
        let first = PermissionComputer::new(&forest).compute_all().into_entries();

        nodes.reverse();
        let forest = TreeBuilder::new(nodes).build().unwrap();
        let second = PermissionComputer::new(&forest).compute_all().into_entries();

        assert_eq!(first, second);
    }

    #[test]
    fn test_ancestor_closure() {
        let root = node("Root", "A");
        let mid = node("Mid", "B").with_parent(root.id);
        let leaf = node("Leaf", "C").with_parent(mid.id);
        let k = CountingCircleId::new();
        let map = group_assignments(vec![CountingCircleAssignment::new(leaf.id, k, "K", "D")]);

        let forest = TreeBuilder::new(vec![root, mid, leaf])
            .with_assignments(&map)
            .build()
            .unwrap();
        let acc = PermissionComputer::new(&forest).compute_all();

        for entry in acc.iter() {
            let idx = forest.index_of(&entry.node_id).unwrap();
            for ancestor in forest.ancestors(idx) {
                assert!(
                    acc.contains(&entry.tenant_id, &forest.node(ancestor).id),
                    "missing ancestor entry for {}",
                    entry.tenant_id
                );
            }
        }
    }
}
