//! [`StableFrame`]: an immutable, committed graph version. Stable frames
//! are never mutated after construction; the only thing that changes over
//! a stable frame's lifetime is how many other frames (and the design's
//! history lists) hold a reference to the snapshots it indexes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::entity_table::Identified;
use crate::id::{FrameId, ObjectId};
use crate::ordered_set::OrderedSet;
use crate::snapshot::{ObjectSnapshot, ObjectView};
use crate::structure::Structure;
use crate::validator::GraphLookup;

/// A read-only view of one edge present in a stable frame, for callers
/// that want to enumerate edges without matching on [`Structure`]
/// themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeView {
    /// The edge object's own id.
    pub edge: ObjectId,
    /// The edge's source node.
    pub origin: ObjectId,
    /// The edge's destination node.
    pub target: ObjectId,
}

/// One immutable, fully-validated version of a design's object graph.
///
/// Stable frames never hold `&mut` access to their objects; every snapshot
/// they index is reachable (and typically shared) via [`Arc`], so cloning
/// a `StableFrame`'s index is cheap and cross-frame sharing falls directly
/// out of Rust's reference counting rather than bespoke copy-on-write
/// bookkeeping.
#[derive(Debug, Clone)]
pub struct StableFrame {
    frame_id: FrameId,
    objects: HashMap<ObjectId, Arc<ObjectSnapshot>>,
    // Precomputed once at construction, since a stable frame never changes
    // after that: which edges touch each node as origin or target.
    outgoing: HashMap<ObjectId, Vec<ObjectId>>,
    incoming: HashMap<ObjectId, Vec<ObjectId>>,
}

impl StableFrame {
    /// Constructs a stable frame directly from its id-to-snapshot index.
    /// Used by `Design::accept` once a transient frame's edits have been
    /// frozen, and by tests that want a frame without going through a
    /// transient frame first.
    pub fn new(frame_id: FrameId, objects: HashMap<ObjectId, Arc<ObjectSnapshot>>) -> Self {
        let mut outgoing: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();
        let mut incoming: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();
        for (&id, snapshot) in &objects {
            if let Structure::Edge { origin, target } = snapshot.structure() {
                outgoing.entry(*origin).or_default().push(id);
                incoming.entry(*target).or_default().push(id);
            }
        }
        Self { frame_id, objects, outgoing, incoming }
    }

    /// This frame's identity.
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Number of objects live in this frame.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Whether `id` is present in this frame.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Looks up an object's snapshot.
    pub fn object(&self, id: ObjectId) -> Option<&Arc<ObjectSnapshot>> {
        self.objects.get(&id)
    }

    /// Iterates every object id present in this frame.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    /// Iterates every snapshot present in this frame.
    pub fn snapshots(&self) -> impl Iterator<Item = &Arc<ObjectSnapshot>> {
        self.objects.values()
    }

    /// Iterates every edge present in this frame.
    pub fn edges(&self) -> impl Iterator<Item = EdgeView> + '_ {
        self.objects.iter().filter_map(|(&id, snapshot)| {
            if let Structure::Edge { origin, target } = snapshot.structure() {
                Some(EdgeView { edge: id, origin: *origin, target: *target })
            } else {
                None
            }
        })
    }

    /// Object ids whose structural kind is `Node`. Strictly narrower than
    /// "not an edge or ordered-set": an `Unstructured` object is neither a
    /// node nor one of those, and is excluded here too, so that every id
    /// this returns is a valid edge endpoint candidate (invariant P4, also
    /// enforced by [`crate::validator::StructuralValidator`]).
    pub fn node_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects
            .iter()
            .filter(|(_, s)| matches!(s.structure(), Structure::Node))
            .map(|(&id, _)| id)
    }

    /// Object ids whose structure is an `Edge`.
    pub fn edge_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.edges().map(|e| e.edge)
    }

    /// Edges with `node` as their origin, looked up in the adjacency index
    /// precomputed at construction.
    pub fn outgoing(&self, node: ObjectId) -> &[ObjectId] {
        self.outgoing.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Edges with `node` as their target, looked up in the adjacency index
    /// precomputed at construction.
    pub fn incoming(&self, node: ObjectId) -> &[ObjectId] {
        self.incoming.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every edge touching `node` as either endpoint.
    pub fn dependent_edges(&self, node: ObjectId) -> Vec<ObjectId> {
        self.outgoing(node).iter().chain(self.incoming(node)).copied().collect()
    }

    /// The ordered-set structure owned by `owner`, if `owner` owns one.
    pub fn ordered_set_of(&self, owner: ObjectId) -> Option<&OrderedSet<ObjectId>> {
        self.objects.values().find_map(|s| match s.structure() {
            Structure::OrderedSet { owner: o, items } if *o == owner => Some(items),
            _ => None,
        })
    }

    /// Objects with no parent: the roots of the hierarchy forest.
    pub fn top(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.iter().filter(|(_, s)| s.parent().is_none()).map(|(&id, _)| id)
    }

    /// Nodes of the given type name.
    pub fn nodes_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = ObjectId> + 'a {
        self.node_ids().filter(move |&id| self.objects[&id].type_name() == type_name)
    }

    /// Edges of the given type name.
    pub fn edges_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = ObjectId> + 'a {
        self.edges().filter(move |e| self.objects[&e.edge].type_name() == type_name).map(|e| e.edge)
    }

    /// Nodes whose type participates in `trait_name`, per `metamodel`.
    pub fn nodes_of_trait<'a>(
        &'a self,
        metamodel: &'a dyn crate::metamodel::Metamodel,
        trait_name: &'a str,
    ) -> impl Iterator<Item = ObjectId> + 'a {
        self.node_ids()
            .filter(move |&id| metamodel.traits(self.objects[&id].type_name()).iter().any(|t| t == trait_name))
    }

    /// Edges whose type participates in `trait_name`, per `metamodel`.
    pub fn edges_of_trait<'a>(
        &'a self,
        metamodel: &'a dyn crate::metamodel::Metamodel,
        trait_name: &'a str,
    ) -> impl Iterator<Item = ObjectId> + 'a {
        self.edges()
            .filter(move |e| metamodel.traits(self.objects[&e.edge].type_name()).iter().any(|t| t == trait_name))
            .map(|e| e.edge)
    }

    /// Object ids whose snapshot satisfies `predicate` — the general form
    /// `nodes_of_type`/`nodes_of_trait`/`edges_of_type`/`edges_of_trait`
    /// specialize; a type or trait filter is just a predicate closure over
    /// `type_name()`/`metamodel.traits(type_name())`, so there is no
    /// separate type/trait-specific overload of `filter` itself.
    pub fn filter<'a>(
        &'a self,
        predicate: impl Fn(&ObjectSnapshot) -> bool + 'a,
    ) -> impl Iterator<Item = ObjectId> + 'a {
        self.objects.iter().filter(move |(_, s)| predicate(s)).map(|(&id, _)| id)
    }

    /// The first object id satisfying `predicate`, in this frame's
    /// (unordered) iteration order.
    pub fn first(&self, predicate: impl Fn(&ObjectSnapshot) -> bool) -> Option<ObjectId> {
        self.objects.iter().find(|(_, s)| predicate(s)).map(|(&id, _)| id)
    }

    /// The distinct values found for attribute `name` across every object
    /// in this frame that declares it.
    pub fn distinct_attribute(&self, name: &str) -> HashSet<String> {
        self.objects.values().filter_map(|s| s.attribute(name)).map(|v| v.display_string()).collect()
    }

    /// The distinct type names present in this frame.
    pub fn distinct_types(&self) -> HashSet<String> {
        self.objects.values().map(|s| s.type_name().to_string()).collect()
    }

    /// The distinct trait names declared, per `metamodel`, on any type
    /// actually instantiated in this frame — the trait vocabulary this
    /// frame's objects participate in, not just the vocabulary the
    /// metamodel knows about in the abstract.
    pub fn shared_traits(&self, metamodel: &dyn crate::metamodel::Metamodel) -> HashSet<String> {
        self.distinct_types()
            .iter()
            .flat_map(|type_name| metamodel.traits(type_name).iter().cloned())
            .collect()
    }

    /// The object of the given type whose declared label attribute matches
    /// `label`, if the metamodel declares one for that type and some
    /// object's value matches.
    pub fn named_object(
        &self,
        metamodel: &dyn crate::metamodel::Metamodel,
        type_name: &str,
        label: &str,
    ) -> Option<ObjectId> {
        let attr = metamodel.label_attribute(type_name)?;
        self.objects
            .iter()
            .find(|(_, s)| {
                s.type_name() == type_name && s.attribute(attr).map(|v| v.display_string()) == Some(label.to_string())
            })
            .map(|(&id, _)| id)
    }

    /// Resolves a caller-supplied string reference against this frame: a
    /// bare `ObjectId` (e.g. `"42"`) if one exists, otherwise the first
    /// object of any type whose declared label attribute matches the
    /// string exactly, per `metamodel`.
    pub fn object_ref(&self, metamodel: &dyn crate::metamodel::Metamodel, string_ref: &str) -> Option<ObjectId> {
        if let Ok(raw) = string_ref.parse::<u64>() {
            let candidate = ObjectId(raw);
            if self.contains(candidate) {
                return Some(candidate);
            }
        }
        self.objects
            .iter()
            .find(|(_, s)| {
                metamodel
                    .label_attribute(s.type_name())
                    .and_then(|attr| s.attribute(attr))
                    .map(|v| v.display_string())
                    .as_deref()
                    == Some(string_ref)
            })
            .map(|(&id, _)| id)
    }

    /// Every structural-integrity violation found across this frame: an
    /// empty result means the frame is referentially sound. Unlike
    /// [`crate::frame::TransientFrame::validate_structure`], this never
    /// fails fast on the first violation found.
    pub fn broken_references(&self) -> Vec<crate::error::StructuralIntegrityError> {
        use crate::validator::StructuralValidator;
        self.object_ids()
            .filter_map(|id| StructuralValidator::validate_snapshot(self, id).err())
            .collect()
    }

    /// Internal accessor for the raw index, used when constructing a
    /// derived [`crate::frame::TransientFrame`].
    pub(crate) fn objects(&self) -> &HashMap<ObjectId, Arc<ObjectSnapshot>> {
        &self.objects
    }
}

impl Identified for StableFrame {
    type Id = FrameId;

    fn id(&self) -> FrameId {
        self.frame_id
    }
}

impl GraphLookup for StableFrame {
    fn lookup(&self, id: ObjectId) -> Option<&dyn ObjectView> {
        self.objects.get(&id).map(|snap| snap.as_ref() as &dyn ObjectView)
    }

    fn object_ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_> {
        Box::new(self.objects.keys().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SnapshotId;
    use std::collections::HashMap as StdHashMap;

    fn snap_typed(
        id: u64,
        type_name: &str,
        structure: Structure,
        attributes: StdHashMap<String, crate::variant::Variant>,
    ) -> Arc<ObjectSnapshot> {
        Arc::new(ObjectSnapshot::new(
            ObjectId(id),
            SnapshotId(id),
            type_name,
            structure,
            None,
            vec![],
            attributes,
        ))
    }

    fn snap(id: u64, structure: Structure) -> Arc<ObjectSnapshot> {
        Arc::new(ObjectSnapshot::new(
            ObjectId(id),
            SnapshotId(id),
            "Node",
            structure,
            None,
            vec![],
            StdHashMap::new(),
        ))
    }

    #[test]
    fn edges_reports_only_edge_structured_objects() {
        let origin = ObjectId(1);
        let target = ObjectId(2);
        let edge_id = ObjectId(3);
        let mut objects = StdHashMap::new();
        objects.insert(origin, snap(1, Structure::Node));
        objects.insert(target, snap(2, Structure::Node));
        objects.insert(edge_id, snap(3, Structure::Edge { origin, target }));
        let frame = StableFrame::new(FrameId(1), objects);

        let edges: Vec<EdgeView> = frame.edges().collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge, edge_id);
    }

    fn three_node_graph() -> (StableFrame, ObjectId, ObjectId, ObjectId) {
        let a = ObjectId(1);
        let b = ObjectId(2);
        let edge_id = ObjectId(3);
        let mut objects = StdHashMap::new();
        objects.insert(a, snap(1, Structure::Node));
        objects.insert(b, snap(2, Structure::Node));
        objects.insert(edge_id, snap(3, Structure::Edge { origin: a, target: b }));
        (StableFrame::new(FrameId(1), objects), a, b, edge_id)
    }

    #[test]
    fn adjacency_index_reports_outgoing_and_incoming() {
        let (frame, a, b, edge_id) = three_node_graph();
        assert_eq!(frame.outgoing(a), &[edge_id]);
        assert_eq!(frame.incoming(b), &[edge_id]);
        assert!(frame.outgoing(b).is_empty());
        assert!(frame.incoming(a).is_empty());
        let mut dependent = frame.dependent_edges(a);
        dependent.sort_by_key(|id| id.0);
        assert_eq!(dependent, vec![edge_id]);
    }

    #[test]
    fn node_ids_and_edge_ids_partition_the_frame() {
        let (frame, a, b, edge_id) = three_node_graph();
        let mut nodes: Vec<ObjectId> = frame.node_ids().collect();
        nodes.sort_by_key(|id| id.0);
        assert_eq!(nodes, vec![a, b]);
        let edges: Vec<ObjectId> = frame.edge_ids().collect();
        assert_eq!(edges, vec![edge_id]);
    }

    #[test]
    fn top_reports_only_parentless_objects() {
        let root = ObjectId(1);
        let child = ObjectId(2);
        let mut objects = StdHashMap::new();
        objects.insert(root, snap(1, Structure::Node));
        let child_snap = ObjectSnapshot::new(
            child,
            SnapshotId(2),
            "Node",
            Structure::Node,
            Some(root),
            vec![],
            StdHashMap::new(),
        );
        objects.insert(child, Arc::new(child_snap));
        let frame = StableFrame::new(FrameId(1), objects);

        let top: Vec<ObjectId> = frame.top().collect();
        assert_eq!(top, vec![root]);
    }

    #[test]
    fn broken_references_reports_every_violation() {
        let a = ObjectId(1);
        let bad_edge = ObjectId(2);
        let mut objects = StdHashMap::new();
        objects.insert(a, snap(1, Structure::Node));
        objects.insert(bad_edge, snap(2, Structure::Edge { origin: a, target: ObjectId(99) }));
        let frame = StableFrame::new(FrameId(1), objects);

        let violations = frame.broken_references();
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            violations[0],
            crate::error::StructuralIntegrityError::BrokenStructureReference { .. }
        ));
    }

    #[test]
    fn ordered_set_of_finds_the_set_owned_by_a_given_object() {
        let owner = ObjectId(1);
        let member = ObjectId(2);
        let set_id = ObjectId(3);
        let mut objects = StdHashMap::new();
        objects.insert(owner, snap(1, Structure::Node));
        objects.insert(member, snap(2, Structure::Node));
        let items: OrderedSet<ObjectId> = [member].into_iter().collect();
        objects.insert(set_id, snap(3, Structure::OrderedSet { owner, items }));
        let frame = StableFrame::new(FrameId(1), objects);

        let found = frame.ordered_set_of(owner).expect("owner has an ordered set");
        assert!(found.contains(&member));
        assert!(frame.ordered_set_of(member).is_none());
    }

    #[test]
    fn nodes_of_type_excludes_unstructured_objects_with_the_same_type_name() {
        let node_obj = ObjectId(1);
        let unstructured_obj = ObjectId(2);
        let mut objects = StdHashMap::new();
        objects.insert(node_obj, snap_typed(1, "Widget", Structure::Node, StdHashMap::new()));
        objects.insert(unstructured_obj, snap_typed(2, "Widget", Structure::Unstructured, StdHashMap::new()));
        let frame = StableFrame::new(FrameId(1), objects);

        let found: Vec<ObjectId> = frame.nodes_of_type("Widget").collect();
        assert_eq!(found, vec![node_obj]);
    }

    #[test]
    fn trait_filters_and_shared_traits_follow_the_metamodel() {
        use crate::metamodel::SimpleMetamodel;
        use crate::structure::StructuralKind;

        let metamodel = SimpleMetamodel::new()
            .register_type("Widget", StructuralKind::Node, vec![])
            .with_trait("Widget", "Taggable")
            .register_type("Wire", StructuralKind::Edge, vec![])
            .with_trait("Wire", "Taggable");

        let widget = ObjectId(1);
        let unrelated = ObjectId(2);
        let origin = ObjectId(3);
        let target = ObjectId(4);
        let wire = ObjectId(5);
        let mut objects = StdHashMap::new();
        objects.insert(widget, snap_typed(1, "Widget", Structure::Node, StdHashMap::new()));
        objects.insert(unrelated, snap_typed(2, "Plain", Structure::Node, StdHashMap::new()));
        objects.insert(origin, snap_typed(3, "Widget", Structure::Node, StdHashMap::new()));
        objects.insert(target, snap_typed(4, "Widget", Structure::Node, StdHashMap::new()));
        objects.insert(wire, snap_typed(5, "Wire", Structure::Edge { origin, target }, StdHashMap::new()));
        let frame = StableFrame::new(FrameId(1), objects);

        let mut nodes: Vec<ObjectId> = frame.nodes_of_trait(&metamodel, "Taggable").collect();
        nodes.sort_by_key(|id| id.0);
        assert_eq!(nodes, vec![widget, origin, target]);
        assert_eq!(frame.edges_of_trait(&metamodel, "Taggable").collect::<Vec<_>>(), vec![wire]);
        assert!(frame.nodes_of_trait(&metamodel, "Nonexistent").next().is_none());

        assert_eq!(frame.shared_traits(&metamodel), HashSet::from(["Taggable".to_string()]));
    }

    #[test]
    fn object_ref_resolves_by_id_then_by_label() {
        use crate::metamodel::SimpleMetamodel;
        use crate::structure::StructuralKind;
        use crate::variant::Variant;

        let metamodel = SimpleMetamodel::new()
            .register_type("Widget", StructuralKind::Node, vec![])
            .with_label_attribute("Widget", "name");

        let by_id = ObjectId(42);
        let by_label = ObjectId(7);
        let mut attrs = StdHashMap::new();
        attrs.insert("name".to_string(), Variant::from("gadget"));
        let mut objects = StdHashMap::new();
        objects.insert(by_id, snap_typed(42, "Widget", Structure::Node, StdHashMap::new()));
        objects.insert(by_label, snap_typed(7, "Widget", Structure::Node, attrs));
        let frame = StableFrame::new(FrameId(1), objects);

        assert_eq!(frame.object_ref(&metamodel, "42"), Some(by_id));
        assert_eq!(frame.object_ref(&metamodel, "gadget"), Some(by_label));
        assert_eq!(frame.object_ref(&metamodel, "missing"), None);
    }
}
