//! [`TransientFrame`]: a mutable, in-progress edit of a design's object
//! graph, opened from a base [`StableFrame`] (or from nothing, for the
//! very first frame of a design) and eventually either accepted into a
//! new stable frame or discarded.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{DesignError, StructuralIntegrityError};
use crate::id::{FrameId, IdKind, IdentityManager, ObjectId, SnapshotId};
use crate::metamodel::Metamodel;
use crate::snapshot::{ObjectSnapshot, ObjectView, SnapshotRef, TransientObject};
use crate::structure::Structure;
use crate::validator::{GraphLookup, StructuralValidator};
use crate::variant::Variant;

use super::stable::StableFrame;

/// The state a [`TransientFrame`] is in. Once a frame leaves `Editing` it
/// is inert: every mutating method returns
/// [`DesignError::NotTransient`](crate::error::DesignError::NotTransient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientState {
    /// Open for mutation.
    Editing,
    /// Frozen into a stable frame by `Design::accept`.
    Accepted,
    /// Abandoned by `Design::discard`.
    Discarded,
}

/// A working copy of a design's object graph, opened for editing.
///
/// Objects untouched since the frame was opened stay shared with the base
/// frame (an [`Arc`] clone, not a deep copy); mutating one promotes it to a
/// private, owned [`TransientObject`]. This is the copy-on-mutate
/// transaction model the design engine is built around.
pub struct TransientFrame {
    frame_id: FrameId,
    state: TransientState,
    base: Option<Arc<StableFrame>>,
    objects: HashMap<ObjectId, SnapshotRef>,
    identity: Arc<IdentityManager>,
    metamodel: Arc<dyn Metamodel>,
    reserved_object_ids: HashSet<ObjectId>,
    reserved_snapshot_ids: HashSet<SnapshotId>,
}

impl std::fmt::Debug for TransientFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransientFrame")
            .field("frame_id", &self.frame_id)
            .field("state", &self.state)
            .field("base", &self.base)
            .field("objects", &self.objects)
            .field("identity", &self.identity)
            .field("reserved_object_ids", &self.reserved_object_ids)
            .field("reserved_snapshot_ids", &self.reserved_snapshot_ids)
            .finish_non_exhaustive()
    }
}

impl TransientFrame {
    pub(crate) fn new(
        frame_id: FrameId,
        base: Option<Arc<StableFrame>>,
        identity: Arc<IdentityManager>,
        metamodel: Arc<dyn Metamodel>,
    ) -> Self {
        let objects = match &base {
            Some(stable) => stable
                .objects()
                .iter()
                .map(|(&id, snapshot)| {
                    (
                        id,
                        SnapshotRef::Stable {
                            from_derivation: true,
                            snapshot: Arc::clone(snapshot),
                        },
                    )
                })
                .collect(),
            None => HashMap::new(),
        };
        Self {
            frame_id,
            state: TransientState::Editing,
            base,
            objects,
            identity,
            metamodel,
            reserved_object_ids: HashSet::new(),
            reserved_snapshot_ids: HashSet::new(),
        }
    }

    /// Object ids this frame has reserved (via `create` or by promoting a
    /// stable object for mutation) but not yet committed. `Design::accept`
    /// promotes these to used identities; `Design::discard` releases them.
    pub(crate) fn reserved_object_ids(&self) -> &HashSet<ObjectId> {
        &self.reserved_object_ids
    }

    /// Snapshot ids reserved by this frame, not yet committed. See
    /// [`Self::reserved_object_ids`].
    pub(crate) fn reserved_snapshot_ids(&self) -> &HashSet<SnapshotId> {
        &self.reserved_snapshot_ids
    }

    /// This frame's identity.
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// This frame's current lifecycle state.
    pub fn state(&self) -> TransientState {
        self.state
    }

    /// The stable frame this one was derived from, if any.
    pub(crate) fn base(&self) -> Option<&Arc<StableFrame>> {
        self.base.as_ref()
    }

    /// Number of objects currently in this frame.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Whether `id` is present in this frame.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Read-only access to an object, regardless of whether it has been
    /// opened for mutation.
    pub fn transient_object(&self, id: ObjectId) -> Option<&dyn ObjectView> {
        self.objects.get(&id).map(|r| r.view())
    }

    fn require_editing(&self) -> Result<(), DesignError> {
        if self.state == TransientState::Editing {
            Ok(())
        } else {
            Err(DesignError::NotTransient)
        }
    }

    /// Creates a new object of `type_name`. `structure` is required for
    /// `Edge` and `OrderedSet` types (there is no sensible default
    /// endpoint/owner to synthesize) and optional otherwise.
    ///
    /// Attributes not supplied default to the values the metamodel
    /// declares for `type_name`.
    pub fn create(
        &mut self,
        type_name: &str,
        structure: Option<Structure>,
        attributes: HashMap<String, Variant>,
    ) -> Result<ObjectId, DesignError> {
        self.require_editing()?;

        if !self.metamodel.contains_type(type_name) {
            return Err(DesignError::UnknownType(type_name.to_string()));
        }
        let expected_kind = self
            .metamodel
            .structural_kind(type_name)
            .expect("contains_type implies structural_kind is known");

        let resolved_structure = match structure {
            Some(s) if s.kind() == expected_kind => s,
            Some(s) => {
                return Err(DesignError::StructureKindMismatch {
                    type_name: type_name.to_string(),
                    expected: expected_kind,
                    found: Some(s.kind()),
                })
            }
            None => Structure::trivial_default(expected_kind).ok_or_else(|| {
                DesignError::StructureKindMismatch {
                    type_name: type_name.to_string(),
                    expected: expected_kind,
                    found: None,
                }
            })?,
        };

        let mut merged = HashMap::new();
        for schema in self.metamodel.declared_attributes(type_name) {
            merged.insert(schema.name.clone(), schema.default.clone());
        }
        merged.extend(attributes);

        let object_id = ObjectId(self.identity.create_and_reserve(IdKind::Object));
        let snapshot_id: crate::id::SnapshotId =
            self.identity.create_and_reserve(IdKind::Snapshot).into();
        self.reserved_object_ids.insert(object_id);
        self.reserved_snapshot_ids.insert(snapshot_id);

        let object =
            TransientObject::new_object(snapshot_id, object_id, type_name, resolved_structure, merged);
        self.objects.insert(object_id, SnapshotRef::Mutable { new: true, object });
        Ok(object_id)
    }

    /// Seeds this frame with a pre-built snapshot, bypassing `create`'s
    /// type and structural-kind checks. Used when a caller constructs the
    /// first frame of a design directly from known-good data (tests,
    /// fixtures, data migrations).
    pub fn unsafe_insert(&mut self, snapshot: ObjectSnapshot) -> Result<(), DesignError> {
        self.require_editing()?;
        let id = snapshot.object_id();
        if self.objects.contains_key(&id) {
            return Err(DesignError::DuplicateObjectId(id));
        }
        self.objects
            .insert(id, SnapshotRef::Mutable { new: true, object: snapshot_into_transient(snapshot) });
        Ok(())
    }

    /// Seeds this frame with a pre-built snapshot, checking that every
    /// structural reference it carries (edge endpoints, ordered-set owner
    /// and items, parent) already resolves within this frame. For bulk
    /// loaders that cannot guarantee that ordering, use
    /// [`Self::unsafe_insert`] and call [`Self::validate_structure`] once
    /// at the end instead.
    pub fn insert(&mut self, snapshot: ObjectSnapshot) -> Result<(), StructuralIntegrityError> {
        StructuralValidator::validate_view(self, snapshot.object_id(), &snapshot)?;
        self.unsafe_insert(snapshot).expect("duplicate ids are a distinct failure mode, checked separately");
        Ok(())
    }

    /// Object ids currently present in this frame whose structural kind is
    /// `Node`. Strictly narrower than "not an edge or ordered-set": an
    /// `Unstructured` object is excluded too, since only a `Node` is a
    /// valid edge endpoint (invariant P4, enforced by
    /// [`crate::validator::StructuralValidator`]).
    pub fn node_ids(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, r)| matches!(r.view().structure(), Structure::Node))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Object ids currently present in this frame whose structure is an
    /// `Edge`.
    pub fn edge_ids(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, r)| matches!(r.view().structure(), Structure::Edge { .. }))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Whether any object in this frame has been created, mutated, or
    /// removed since it was opened.
    pub fn has_changes(&self) -> bool {
        self.objects.values().any(|r| matches!(r, SnapshotRef::Mutable { .. }))
            || self.base.as_ref().map(|b| b.object_count()).unwrap_or(0) != self.objects.len()
    }

    /// Object ids currently open for mutation in this frame (created or
    /// promoted from the base via [`Self::mutate`]).
    pub fn mutable_objects(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, r)| matches!(r, SnapshotRef::Mutable { .. }))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Object ids whose attributes or hierarchy actually changed since
    /// this frame was opened (a subset of [`Self::mutable_objects`]: a
    /// freshly created object that was never subsequently edited is
    /// mutable but not "changed" in this sense).
    pub fn changed_objects(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter_map(|(&id, r)| match r {
                SnapshotRef::Mutable { new: true, .. } => Some(id),
                SnapshotRef::Mutable { new: false, object } if object.is_dirty() => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Object ids present in the base frame this one was derived from but
    /// absent here.
    pub fn removed_objects(&self) -> Vec<ObjectId> {
        match &self.base {
            Some(base) => base.ids().filter(|id| !self.objects.contains_key(id)).collect(),
            None => Vec::new(),
        }
    }

    /// Opens an object for mutation, promoting it from a shared stable
    /// reference to a private working copy on first access.
    pub fn mutate(&mut self, id: ObjectId) -> Result<&mut TransientObject, DesignError> {
        self.require_editing()?;
        if !self.objects.contains_key(&id) {
            return Err(DesignError::UnknownObjectId(id));
        }
        let needs_promotion = matches!(self.objects.get(&id), Some(SnapshotRef::Stable { .. }));
        if needs_promotion {
            let new_snapshot_id: crate::id::SnapshotId =
                self.identity.create_and_reserve(IdKind::Snapshot).into();
            self.reserved_snapshot_ids.insert(new_snapshot_id);
            if let Some(SnapshotRef::Stable { snapshot, .. }) = self.objects.get(&id) {
                let promoted = TransientObject::from_stable(new_snapshot_id, snapshot);
                self.objects.insert(id, SnapshotRef::Mutable { new: false, object: promoted });
            }
        }
        match self.objects.get_mut(&id) {
            Some(SnapshotRef::Mutable { object, .. }) => Ok(object),
            _ => unreachable!("promoted above"),
        }
    }

    /// Attaches `child` under `parent`. Fails if `child` already has a
    /// parent; re-parenting requires an explicit [`Self::remove_child`]
    /// first.
    pub fn add_child(&mut self, parent: ObjectId, child: ObjectId) -> Result<(), DesignError> {
        self.require_editing()?;
        let current_parent = self
            .objects
            .get(&child)
            .ok_or(DesignError::UnknownObjectId(child))?
            .view()
            .parent();
        if current_parent.is_some() {
            return Err(DesignError::AlreadyHasParent { child });
        }
        if !self.objects.contains_key(&parent) {
            return Err(DesignError::UnknownObjectId(parent));
        }
        self.mutate(parent)?.push_child(child);
        self.mutate(child)?.set_parent(Some(parent));
        Ok(())
    }

    /// Detaches `child` from `parent`.
    pub fn remove_child(&mut self, parent: ObjectId, child: ObjectId) -> Result<(), DesignError> {
        self.require_editing()?;
        self.mutate(parent)?.remove_child(child);
        self.mutate(child)?.set_parent(None);
        Ok(())
    }

    /// Sets `child`'s parent pointer directly, without updating any
    /// parent's children list. A lower-level primitive than [`Self::add_child`]
    /// for hierarchy repairs that maintain the children list separately.
    pub fn set_parent(&mut self, child: ObjectId, parent: Option<ObjectId>) -> Result<(), DesignError> {
        self.require_editing()?;
        self.mutate(child)?.set_parent(parent);
        Ok(())
    }

    /// Clears `child`'s parent pointer, without touching the former
    /// parent's children list. See [`Self::set_parent`].
    pub fn remove_from_parent(&mut self, child: ObjectId) -> Result<(), DesignError> {
        self.set_parent(child, None)
    }

    /// Removes `id` and everything that would otherwise dangle without it:
    /// every descendant reachable through the children hierarchy, every
    /// edge with `id` (or a cascaded removal) as an endpoint, and every
    /// ordered-set owned by `id` or a cascaded removal. Ordered sets that
    /// merely contain a removed item (without being removed themselves)
    /// are mutated to drop that item instead. Returns every removed id,
    /// including `id` itself.
    pub fn remove_cascading(&mut self, id: ObjectId) -> Result<Vec<ObjectId>, DesignError> {
        self.require_editing()?;
        if !self.objects.contains_key(&id) {
            return Err(DesignError::UnknownObjectId(id));
        }

        let mut removed = HashSet::new();
        self.collect_subtree(id, &mut removed);

        loop {
            let mut newly_cascaded = Vec::new();
            for oid in self.objects.keys().copied().collect::<Vec<_>>() {
                if removed.contains(&oid) {
                    continue;
                }
                let cascades = match self.objects.get(&oid).unwrap().view().structure() {
                    Structure::Edge { origin, target } => {
                        removed.contains(origin) || removed.contains(target)
                    }
                    Structure::OrderedSet { owner, .. } => removed.contains(owner),
                    _ => false,
                };
                if cascades {
                    newly_cascaded.push(oid);
                }
            }
            if newly_cascaded.is_empty() {
                break;
            }
            for oid in newly_cascaded {
                self.collect_subtree(oid, &mut removed);
            }
        }

        let parent = self.objects.get(&id).and_then(|r| r.view().parent());
        if let Some(parent) = parent {
            if !removed.contains(&parent) {
                self.mutate(parent)?.remove_child(id);
            }
        }

        let surviving_sets: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|(oid, r)| {
                !removed.contains(oid)
                    && matches!(r.view().structure(), Structure::OrderedSet { items, .. } if items.iter().any(|item| removed.contains(item)))
            })
            .map(|(&oid, _)| oid)
            .collect();
        for oid in surviving_sets {
            let Structure::OrderedSet { owner, mut items } = self.objects.get(&oid).unwrap().view().structure().clone() else {
                unreachable!("filtered above");
            };
            for removed_item in &removed {
                items.remove(removed_item);
            }
            self.mutate(oid)?.set_structure(Structure::OrderedSet { owner, items });
        }

        for removed_id in &removed {
            self.objects.remove(removed_id);
        }
        Ok(removed.into_iter().collect())
    }

    fn collect_subtree(&self, root: ObjectId, into: &mut HashSet<ObjectId>) {
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if !into.insert(current) {
                continue;
            }
            if let Some(r) = self.objects.get(&current) {
                stack.extend(r.view().children().iter().copied());
            }
        }
    }

    /// Runs structural validation (referential integrity, parent/child
    /// mutuality, acyclicity, edge/ordered-set endpoint typing) against
    /// this frame's current state.
    pub fn validate_structure(&self) -> Result<(), StructuralIntegrityError> {
        StructuralValidator::validate_snapshots(self)
    }

    /// Freezes every object in this frame into an [`ObjectSnapshot`],
    /// consuming the frame. Objects untouched since the frame was opened
    /// keep their original `Arc`; mutated and newly-created objects are
    /// frozen via [`TransientObject::to_stable`].
    pub(crate) fn accept_internal(self) -> HashMap<ObjectId, Arc<ObjectSnapshot>> {
        self.objects
            .into_iter()
            .map(|(id, r)| {
                let snapshot = match r {
                    SnapshotRef::Stable { snapshot, .. } => snapshot,
                    SnapshotRef::Mutable { object, .. } => Arc::new(object.to_stable()),
                };
                (id, snapshot)
            })
            .collect()
    }

    pub(crate) fn mark_accepted(&mut self) {
        self.state = TransientState::Accepted;
    }

    pub(crate) fn mark_discarded(&mut self) {
        self.state = TransientState::Discarded;
    }
}

fn snapshot_into_transient(snapshot: ObjectSnapshot) -> TransientObject {
    let snapshot_id = snapshot.snapshot_id();
    TransientObject::from_stable(snapshot_id, &snapshot)
}

impl GraphLookup for TransientFrame {
    fn lookup(&self, id: ObjectId) -> Option<&dyn ObjectView> {
        self.objects.get(&id).map(|r| r.view())
    }

    fn object_ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_> {
        Box::new(self.objects.keys().copied())
    }
}
