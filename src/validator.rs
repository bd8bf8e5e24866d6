//! Pure structural-validation functions shared by [`crate::frame::TransientFrame`]
//! and [`crate::design::Design`]. Nothing here touches history, identity
//! allocation, or the metamodel's constraint checker — only the graph shape
//! invariants: referential integrity, parent/child mutuality, acyclicity,
//! and edge/ordered-set endpoint typing.

use std::collections::{HashMap, HashSet};

use crate::error::StructuralIntegrityError;
use crate::id::ObjectId;
use crate::snapshot::ObjectView;
use crate::structure::{Structure, StructuralKind};

/// Read-only access to a frame's objects, independent of whether the frame
/// is stable or transient. [`StructuralValidator`] is generic over this so
/// the same checks run against either frame kind.
pub trait GraphLookup {
    /// Looks up an object's view by id.
    fn lookup(&self, id: ObjectId) -> Option<&dyn ObjectView>;
    /// Iterates every object id present in the frame.
    fn object_ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_>;
}

/// Structural-validation pure functions. Stateless; every method takes the
/// frame to validate as an argument.
pub struct StructuralValidator;

impl StructuralValidator {
    /// Validates a single object's structural references against `frame`:
    /// edge endpoints and ordered-set owner/items must exist and have the
    /// right structural kind, and the object's own parent/children must
    /// exist. Does not check parent/child mutuality or acyclicity; see
    /// [`Self::validate_snapshots`] for the whole-frame checks.
    pub fn validate_snapshot(
        frame: &dyn GraphLookup,
        id: ObjectId,
    ) -> Result<(), StructuralIntegrityError> {
        let view = frame
            .lookup(id)
            .expect("validate_snapshot called with an id not present in the frame");
        Self::validate_view(frame, id, view)
    }

    /// Like [`Self::validate_snapshot`], but checks a candidate view that
    /// need not already be present in `frame` — used to validate a
    /// snapshot before inserting it.
    pub fn validate_view(
        frame: &dyn GraphLookup,
        id: ObjectId,
        view: &dyn ObjectView,
    ) -> Result<(), StructuralIntegrityError> {
        if let Some(parent) = view.parent() {
            if frame.lookup(parent).is_none() {
                return Err(StructuralIntegrityError::BrokenParent { child: id, parent });
            }
        }
        for &child in view.children() {
            if frame.lookup(child).is_none() {
                return Err(StructuralIntegrityError::BrokenChild { parent: id, child });
            }
        }

        match view.structure() {
            Structure::Unstructured | Structure::Node => {}
            Structure::Edge { origin, target } => {
                for &endpoint in &[*origin, *target] {
                    let Some(endpoint_view) = frame.lookup(endpoint) else {
                        return Err(StructuralIntegrityError::BrokenStructureReference {
                            object: id,
                            target: endpoint,
                        });
                    };
                    if endpoint_view.structure().kind() != StructuralKind::Node {
                        return Err(StructuralIntegrityError::EdgeEndpointNotANode {
                            object: id,
                            endpoint,
                        });
                    }
                }
            }
            Structure::OrderedSet { owner, items } => {
                if frame.lookup(*owner).is_none() {
                    return Err(StructuralIntegrityError::BrokenStructureReference {
                        object: id,
                        target: *owner,
                    });
                }
                for &item in items {
                    let Some(item_view) = frame.lookup(item) else {
                        return Err(StructuralIntegrityError::BrokenStructureReference {
                            object: id,
                            target: item,
                        });
                    };
                    if item_view.structure().kind() == StructuralKind::OrderedSet {
                        return Err(StructuralIntegrityError::EdgeEndpointNotANode {
                            object: id,
                            endpoint: item,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns every object id referenced by `id`'s structure, parent, or
    /// children that is missing from `frame`. Used by callers that want a
    /// complete list of broken references rather than the first one found.
    pub fn broken_references(frame: &dyn GraphLookup, id: ObjectId) -> Vec<ObjectId> {
        let Some(view) = frame.lookup(id) else {
            return Vec::new();
        };
        let mut missing = Vec::new();

        if let Some(parent) = view.parent() {
            if frame.lookup(parent).is_none() {
                missing.push(parent);
            }
        }
        for &child in view.children() {
            if frame.lookup(child).is_none() {
                missing.push(child);
            }
        }
        match view.structure() {
            Structure::Unstructured | Structure::Node => {}
            Structure::Edge { origin, target } => {
                for &endpoint in &[*origin, *target] {
                    if frame.lookup(endpoint).is_none() {
                        missing.push(endpoint);
                    }
                }
            }
            Structure::OrderedSet { owner, items } => {
                if frame.lookup(*owner).is_none() {
                    missing.push(*owner);
                }
                for &item in items {
                    if frame.lookup(item).is_none() {
                        missing.push(item);
                    }
                }
            }
        }
        missing
    }

    /// Validates every object in `frame`: per-object structural references
    /// (via [`Self::validate_snapshot`]), parent/child mutuality, and
    /// acyclicity of the parent relation.
    pub fn validate_snapshots(frame: &dyn GraphLookup) -> Result<(), StructuralIntegrityError> {
        let ids: Vec<ObjectId> = frame.object_ids().collect();

        for &id in &ids {
            Self::validate_snapshot(frame, id)?;
        }

        for &id in &ids {
            let view = frame.lookup(id).expect("id came from object_ids");
            for &child in view.children() {
                let child_view = frame.lookup(child).expect("checked present above");
                if child_view.parent() != Some(id) {
                    return Err(StructuralIntegrityError::ParentChildMismatch { a: id, b: child });
                }
            }
            if let Some(parent) = view.parent() {
                let parent_view = frame.lookup(parent).expect("checked present above");
                if !parent_view.children().contains(&id) {
                    return Err(StructuralIntegrityError::ParentChildMismatch { a: parent, b: id });
                }
            }
        }

        Self::check_acyclic(frame, &ids)
    }

    /// Peels off objects with no children repeatedly (a topological-sort
    /// style pass over the parent relation); any objects left over after no
    /// more progress can be made are part of a cycle.
    fn check_acyclic(
        frame: &dyn GraphLookup,
        ids: &[ObjectId],
    ) -> Result<(), StructuralIntegrityError> {
        let mut remaining_children: HashMap<ObjectId, usize> = HashMap::new();
        for &id in ids {
            let view = frame.lookup(id).expect("id came from object_ids");
            remaining_children.insert(id, view.children().len());
        }

        let mut alive: HashSet<ObjectId> = ids.iter().copied().collect();
        loop {
            let leaves: Vec<ObjectId> = alive
                .iter()
                .copied()
                .filter(|id| remaining_children.get(id).copied().unwrap_or(0) == 0)
                .collect();
            if leaves.is_empty() {
                break;
            }
            for leaf in leaves {
                alive.remove(&leaf);
                let view = frame.lookup(leaf).expect("id came from object_ids");
                if let Some(parent) = view.parent() {
                    if let Some(count) = remaining_children.get_mut(&parent) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }

        if alive.is_empty() {
            Ok(())
        } else {
            Err(StructuralIntegrityError::ParentChildCycle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ObjectSnapshot;
    use crate::id::SnapshotId;
    use std::collections::HashMap as StdHashMap;

    struct TestFrame(StdHashMap<ObjectId, ObjectSnapshot>);

    impl GraphLookup for TestFrame {
        fn lookup(&self, id: ObjectId) -> Option<&dyn ObjectView> {
            self.0.get(&id).map(|s| s as &dyn ObjectView)
        }

        fn object_ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_> {
            Box::new(self.0.keys().copied())
        }
    }

    fn node(id: u64, parent: Option<u64>, children: &[u64]) -> (ObjectId, ObjectSnapshot) {
        let oid = ObjectId(id);
        (
            oid,
            ObjectSnapshot::new(
                oid,
                SnapshotId(id),
                "Node",
                Structure::Node,
                parent.map(ObjectId),
                children.iter().map(|&c| ObjectId(c)).collect(),
                StdHashMap::new(),
            ),
        )
    }

    #[test]
    fn detects_broken_parent() {
        let (id, snap) = node(1, Some(99), &[]);
        let frame = TestFrame([(id, snap)].into_iter().collect());
        let err = StructuralValidator::validate_snapshots(&frame).unwrap_err();
        assert!(matches!(err, StructuralIntegrityError::BrokenParent { .. }));
    }

    #[test]
    fn detects_parent_child_mismatch() {
        let (id1, snap1) = node(1, None, &[2]);
        let (id2, snap2) = node(2, None, &[]);
        let frame = TestFrame([(id1, snap1), (id2, snap2)].into_iter().collect());
        let err = StructuralValidator::validate_snapshots(&frame).unwrap_err();
        assert!(matches!(err, StructuralIntegrityError::ParentChildMismatch { .. }));
    }

    #[test]
    fn mutual_parent_child_passes() {
        let (id1, snap1) = node(1, None, &[2]);
        let (id2, snap2) = node(2, Some(1), &[]);
        let frame = TestFrame([(id1, snap1), (id2, snap2)].into_iter().collect());
        assert!(StructuralValidator::validate_snapshots(&frame).is_ok());
    }

    #[test]
    fn detects_cycle() {
        let (id1, snap1) = node(1, Some(2), &[2]);
        let (id2, snap2) = node(2, Some(1), &[1]);
        let frame = TestFrame([(id1, snap1), (id2, snap2)].into_iter().collect());
        let err = StructuralValidator::validate_snapshots(&frame).unwrap_err();
        assert!(matches!(err, StructuralIntegrityError::ParentChildCycle));
    }

    #[test]
    fn edge_endpoint_must_be_node() {
        let origin = ObjectId(1);
        let target = ObjectId(2);
        let edge = ObjectId(3);
        let origin_snap = ObjectSnapshot::new(
            origin,
            SnapshotId(1),
            "Node",
            Structure::Node,
            None,
            vec![],
            StdHashMap::new(),
        );
        let target_snap = ObjectSnapshot::new(
            target,
            SnapshotId(2),
            "Note",
            Structure::Unstructured,
            None,
            vec![],
            StdHashMap::new(),
        );
        let edge_snap = ObjectSnapshot::new(
            edge,
            SnapshotId(3),
            "Edge",
            Structure::Edge { origin, target },
            None,
            vec![],
            StdHashMap::new(),
        );
        let frame = TestFrame(
            [(origin, origin_snap), (target, target_snap), (edge, edge_snap)]
                .into_iter()
                .collect(),
        );
        let err = StructuralValidator::validate_snapshots(&frame).unwrap_err();
        assert!(matches!(err, StructuralIntegrityError::EdgeEndpointNotANode { .. }));
    }
}
