//! Object versions: [`ObjectSnapshot`] is the immutable, ref-counted
//! representation stored inside stable frames; [`TransientObject`] is the
//! mutable working copy created from one while a frame is being edited.
//! Both implement [`ObjectView`] so read-only code can work uniformly over
//! either.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::entity_table::Identified;
use crate::id::{ObjectId, SnapshotId};
use crate::structure::Structure;
use crate::variant::Variant;

/// Attribute names an object type may never declare: looking one of these
/// up through [`resolve_attribute`] yields a synthesized value derived from
/// the object's identity or structure instead of an ordinary stored
/// attribute. `snapshot_id` is deliberately absent here since it is not
/// part of [`ObjectView`]; callers with an [`ObjectSnapshot`] in hand use
/// its `snapshot_id()` accessor directly.
pub const RESERVED_ATTRIBUTE_NAMES: &[&str] =
    &["id", "snapshot_id", "origin", "target", "type", "parent", "structure"];

/// Resolves `name` against `view`, synthesizing a value for the reserved
/// names (`id`, `type`, `parent`, `structure`, and `origin`/`target` on
/// edges) rather than treating them as ordinary stored attributes. Falls
/// through to [`ObjectView::attribute`] for everything else.
pub fn resolve_attribute(view: &dyn ObjectView, name: &str) -> Option<Variant> {
    match name {
        "id" => Some(Variant::from(view.object_id().to_string())),
        "type" => Some(Variant::from(view.type_name().to_string())),
        "parent" => view.parent().map(|p| Variant::from(p.to_string())),
        "structure" => Some(Variant::from(view.structure().kind().as_str())),
        "origin" => match view.structure() {
            Structure::Edge { origin, .. } => Some(Variant::from(origin.to_string())),
            _ => None,
        },
        "target" => match view.structure() {
            Structure::Edge { target, .. } => Some(Variant::from(target.to_string())),
            _ => None,
        },
        "snapshot_id" => None,
        _ => view.attribute(name).cloned(),
    }
}

/// Read-only view common to [`ObjectSnapshot`] and [`TransientObject`].
pub trait ObjectView {
    /// The logical object this version belongs to.
    fn object_id(&self) -> ObjectId;
    /// The object's type name.
    fn type_name(&self) -> &str;
    /// The object's graph role.
    fn structure(&self) -> &Structure;
    /// The object's parent, if it has one.
    fn parent(&self) -> Option<ObjectId>;
    /// The object's children, in first-attachment order.
    fn children(&self) -> &[ObjectId];
    /// Looks up an attribute value by name.
    fn attribute(&self, name: &str) -> Option<&Variant>;
    /// Iterates every declared attribute.
    fn attributes(&self) -> &HashMap<String, Variant>;
}

/// One immutable, committed version of an object. Stored inside a
/// [`crate::frame::StableFrame`]'s entity table and shared by reference
/// count across every stable frame that still needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSnapshot {
    object_id: ObjectId,
    snapshot_id: SnapshotId,
    type_name: String,
    structure: Structure,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    attributes: HashMap<String, Variant>,
}

impl ObjectSnapshot {
    /// Constructs a snapshot directly. Used by [`TransientObject::to_stable`]
    /// and by tests that need to seed a frame without going through a
    /// transient frame.
    pub fn new(
        object_id: ObjectId,
        snapshot_id: SnapshotId,
        type_name: impl Into<String>,
        structure: Structure,
        parent: Option<ObjectId>,
        children: Vec<ObjectId>,
        attributes: HashMap<String, Variant>,
    ) -> Self {
        Self {
            object_id,
            snapshot_id,
            type_name: type_name.into(),
            structure,
            parent,
            children,
            attributes,
        }
    }

    /// This version's snapshot identity.
    pub fn snapshot_id(&self) -> SnapshotId {
        self.snapshot_id
    }
}

impl ObjectView for ObjectSnapshot {
    fn object_id(&self) -> ObjectId {
        self.object_id
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn structure(&self) -> &Structure {
        &self.structure
    }

    fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    fn children(&self) -> &[ObjectId] {
        &self.children
    }

    fn attribute(&self, name: &str) -> Option<&Variant> {
        self.attributes.get(name)
    }

    fn attributes(&self) -> &HashMap<String, Variant> {
        &self.attributes
    }
}

impl Identified for ObjectSnapshot {
    type Id = SnapshotId;

    fn id(&self) -> SnapshotId {
        self.snapshot_id
    }
}

/// A mutable working copy of an object, live inside exactly one
/// [`crate::frame::TransientFrame`]. Tracks which attributes changed and
/// whether its hierarchy (parent or children) changed, so `accept` can tell
/// which objects actually need a fresh [`ObjectSnapshot`].
#[derive(Debug, Clone)]
pub struct TransientObject {
    new_snapshot_id: SnapshotId,
    object_id: ObjectId,
    type_name: String,
    structure: Structure,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    attributes: HashMap<String, Variant>,
    changed_attributes: HashSet<String>,
    hierarchy_changed: bool,
}

impl TransientObject {
    /// Starts a fresh object with no committed history.
    pub fn new_object(
        new_snapshot_id: SnapshotId,
        object_id: ObjectId,
        type_name: impl Into<String>,
        structure: Structure,
        attributes: HashMap<String, Variant>,
    ) -> Self {
        Self {
            new_snapshot_id,
            object_id,
            type_name: type_name.into(),
            structure,
            parent: None,
            children: Vec::new(),
            attributes,
            changed_attributes: HashSet::new(),
            hierarchy_changed: false,
        }
    }

    /// Opens an existing snapshot for mutation, pre-allocating the snapshot
    /// id it will receive if and when the frame is accepted.
    pub fn from_stable(new_snapshot_id: SnapshotId, stable: &ObjectSnapshot) -> Self {
        Self {
            new_snapshot_id,
            object_id: stable.object_id,
            type_name: stable.type_name.clone(),
            structure: stable.structure.clone(),
            parent: stable.parent,
            children: stable.children.clone(),
            attributes: stable.attributes.clone(),
            changed_attributes: HashSet::new(),
            hierarchy_changed: false,
        }
    }

    /// The snapshot id this object will receive when its owning frame is
    /// accepted.
    pub fn pending_snapshot_id(&self) -> SnapshotId {
        self.new_snapshot_id
    }

    /// Whether any attribute was written since this copy was opened.
    pub fn is_dirty(&self) -> bool {
        !self.changed_attributes.is_empty() || self.hierarchy_changed
    }

    /// Whether this object's parent or children changed since it was
    /// opened.
    pub fn hierarchy_changed(&self) -> bool {
        self.hierarchy_changed
    }

    /// The set of attribute names written since this copy was opened.
    pub fn changed_attributes(&self) -> &HashSet<String> {
        &self.changed_attributes
    }

    /// Writes an attribute, recording it as changed.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Variant) {
        let name = name.into();
        self.attributes.insert(name.clone(), value);
        self.changed_attributes.insert(name);
    }

    /// Sets this object's parent, marking the hierarchy as changed.
    pub(crate) fn set_parent(&mut self, parent: Option<ObjectId>) {
        self.parent = parent;
        self.hierarchy_changed = true;
    }

    /// Appends to this object's children list, marking the hierarchy as
    /// changed.
    pub(crate) fn push_child(&mut self, child: ObjectId) {
        self.children.push(child);
        self.hierarchy_changed = true;
    }

    /// Removes a child from this object's children list, marking the
    /// hierarchy as changed if it was present.
    pub(crate) fn remove_child(&mut self, child: ObjectId) {
        let before = self.children.len();
        self.children.retain(|&c| c != child);
        if self.children.len() != before {
            self.hierarchy_changed = true;
        }
    }

    /// Replaces this object's structure payload directly. Used when an
    /// ordered-set structure's membership changes without the object
    /// itself being the hierarchy parent/child of anything.
    pub(crate) fn set_structure(&mut self, structure: Structure) {
        self.structure = structure;
        self.hierarchy_changed = true;
    }

    /// Freezes this working copy into an immutable [`ObjectSnapshot`],
    /// consuming the change-tracking bookkeeping.
    pub fn to_stable(&self) -> ObjectSnapshot {
        ObjectSnapshot {
            object_id: self.object_id,
            snapshot_id: self.new_snapshot_id,
            type_name: self.type_name.clone(),
            structure: self.structure.clone(),
            parent: self.parent,
            children: self.children.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

impl ObjectView for TransientObject {
    fn object_id(&self) -> ObjectId {
        self.object_id
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn structure(&self) -> &Structure {
        &self.structure
    }

    fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    fn children(&self) -> &[ObjectId] {
        &self.children
    }

    fn attribute(&self, name: &str) -> Option<&Variant> {
        self.attributes.get(name)
    }

    fn attributes(&self) -> &HashMap<String, Variant> {
        &self.attributes
    }
}

/// What a transient frame's per-object slot currently holds: an unmodified
/// reference to a stable snapshot, or a mutable working copy.
#[derive(Debug, Clone)]
pub enum SnapshotRef {
    /// Unmodified since the frame was opened; shared with whichever stable
    /// frame it was derived from.
    Stable {
        /// Whether this object existed in the frame this transient frame
        /// was derived from (`true`), as opposed to being created directly
        /// in the stable frame's seed snapshot (never the case in
        /// practice, kept for symmetry with `Mutable::new`).
        from_derivation: bool,
        /// The shared, immutable snapshot.
        snapshot: Arc<ObjectSnapshot>,
    },
    /// Opened for editing in this frame.
    Mutable {
        /// Whether this object did not exist before this frame was opened.
        new: bool,
        /// The working copy.
        object: TransientObject,
    },
}

impl SnapshotRef {
    /// Returns a [`ObjectView`] over whichever variant this ref holds.
    pub fn view(&self) -> &dyn ObjectView {
        match self {
            SnapshotRef::Stable { snapshot, .. } => snapshot.as_ref(),
            SnapshotRef::Mutable { object, .. } => object,
        }
    }

    /// Whether this object was newly created in the current frame (either
    /// never committed before, or freshly opened without a prior version).
    pub fn is_new(&self) -> bool {
        matches!(self, SnapshotRef::Mutable { new: true, .. })
    }
}

impl Identified for SnapshotRef {
    type Id = ObjectId;

    fn id(&self) -> ObjectId {
        self.view().object_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, Variant)]) -> HashMap<String, Variant> {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn from_stable_starts_clean_and_set_attribute_marks_dirty() {
        let stable = ObjectSnapshot::new(
            ObjectId(1),
            SnapshotId(1),
            "Note",
            Structure::Unstructured,
            None,
            vec![],
            attrs(&[("text", Variant::from("hello"))]),
        );
        let mut t = TransientObject::from_stable(SnapshotId(2), &stable);
        assert!(!t.is_dirty());
        t.set_attribute("text", Variant::from("world"));
        assert!(t.is_dirty());
        assert!(t.changed_attributes().contains("text"));
        assert_eq!(t.attribute("text"), Some(&Variant::from("world")));
    }

    #[test]
    fn to_stable_carries_pending_snapshot_id() {
        let stable = ObjectSnapshot::new(
            ObjectId(1),
            SnapshotId(1),
            "Note",
            Structure::Unstructured,
            None,
            vec![],
            attrs(&[]),
        );
        let t = TransientObject::from_stable(SnapshotId(7), &stable);
        let refrozen = t.to_stable();
        assert_eq!(refrozen.snapshot_id(), SnapshotId(7));
        assert_eq!(refrozen.object_id(), ObjectId(1));
    }

    #[test]
    fn resolve_attribute_synthesizes_reserved_names() {
        let snap = ObjectSnapshot::new(
            ObjectId(3),
            SnapshotId(1),
            "Box",
            Structure::Edge { origin: ObjectId(1), target: ObjectId(2) },
            Some(ObjectId(9)),
            vec![],
            attrs(&[]),
        );
        assert_eq!(resolve_attribute(&snap, "id"), Some(Variant::from(ObjectId(3).to_string())));
        assert_eq!(resolve_attribute(&snap, "type"), Some(Variant::from("Box")));
        assert_eq!(resolve_attribute(&snap, "structure"), Some(Variant::from("edge")));
        assert_eq!(resolve_attribute(&snap, "parent"), Some(Variant::from(ObjectId(9).to_string())));
        assert_eq!(resolve_attribute(&snap, "origin"), Some(Variant::from(ObjectId(1).to_string())));
        assert_eq!(resolve_attribute(&snap, "target"), Some(Variant::from(ObjectId(2).to_string())));
    }

    #[test]
    fn hierarchy_mutation_marks_changed() {
        let mut t = TransientObject::new_object(
            SnapshotId(1),
            ObjectId(1),
            "Note",
            Structure::Unstructured,
            attrs(&[]),
        );
        assert!(!t.hierarchy_changed());
        t.push_child(ObjectId(2));
        assert!(t.hierarchy_changed());
    }
}
