//! The tagged variant describing an object's role in the graph.

use crate::id::ObjectId;
use crate::ordered_set::OrderedSet;

/// An object's graph role: plain, a node, an edge between two nodes, or an
/// ordered hyper-edge-like grouping owned by another object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Structure {
    /// No graph role; the object only carries attributes.
    Unstructured,
    /// A graph node; may be referenced as an edge endpoint.
    Node,
    /// A directed edge between two node endpoints.
    Edge {
        /// The edge's source node.
        origin: ObjectId,
        /// The edge's destination node.
        target: ObjectId,
    },
    /// A hyper-edge-like ordered grouping of member objects, owned by
    /// another object.
    OrderedSet {
        /// The object that owns this grouping.
        owner: ObjectId,
        /// Member object ids, in first-insertion order.
        items: OrderedSet<ObjectId>,
    },
}

/// The structural-kind tag of a [`Structure`], independent of its payload.
/// Used to check a type's declared structural kind against the structure
/// actually supplied at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralKind {
    /// See [`Structure::Unstructured`].
    Unstructured,
    /// See [`Structure::Node`].
    Node,
    /// See [`Structure::Edge`].
    Edge,
    /// See [`Structure::OrderedSet`].
    OrderedSet,
}

impl StructuralKind {
    /// The canonical spelling used by the synthetic `structure` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            StructuralKind::Unstructured => "unstructured",
            StructuralKind::Node => "node",
            StructuralKind::Edge => "edge",
            StructuralKind::OrderedSet => "ordered_set",
        }
    }
}

impl Structure {
    /// Returns this structure's kind tag.
    pub fn kind(&self) -> StructuralKind {
        match self {
            Structure::Unstructured => StructuralKind::Unstructured,
            Structure::Node => StructuralKind::Node,
            Structure::Edge { .. } => StructuralKind::Edge,
            Structure::OrderedSet { .. } => StructuralKind::OrderedSet,
        }
    }

    /// Builds the default structure for a structural kind that does not
    /// need any caller-supplied payload. `Edge` and `OrderedSet` have no
    /// sensible default (their endpoints/owner cannot be synthesized) and
    /// so are not covered here; callers must supply a `Structure`
    /// explicitly for those kinds.
    pub fn trivial_default(kind: StructuralKind) -> Option<Structure> {
        match kind {
            StructuralKind::Unstructured => Some(Structure::Unstructured),
            StructuralKind::Node => Some(Structure::Node),
            StructuralKind::Edge | StructuralKind::OrderedSet => None,
        }
    }
}
