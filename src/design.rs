//! [`Design`]: the top-level handle to a versioned object graph. Owns
//! identity allocation, the shared snapshot and stable-frame pools, the
//! undo/redo timeline, named-frame bindings, and a side-table of
//! non-persisted runtime components keyed by object id.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::config::DesignConfig;
use crate::entity_table::EntityTable;
use crate::error::{AcceptError, AcceptFailure, DesignError, FrameValidationError, ValidateError};
use crate::frame::{StableFrame, TransientFrame, TransientState};
use crate::id::{FrameId, IdKind, IdentityManager, ObjectId};
use crate::metamodel::{ConstraintViolation, Metamodel};
use crate::snapshot::ObjectSnapshot;

/// A stable frame that has been checked against its metamodel's constraints
/// and found clean. There is no way to construct one carrying violations;
/// `Design::validate` returns `Err` instead.
#[derive(Clone)]
pub struct ValidatedFrame {
    /// The frame that was checked.
    pub frame: Arc<StableFrame>,
    /// The metamodel it was checked against.
    pub metamodel: Arc<dyn Metamodel>,
}

impl std::fmt::Debug for ValidatedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedFrame")
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

struct Inner {
    snapshots: EntityTable<Arc<ObjectSnapshot>>,
    frames: EntityTable<Arc<StableFrame>>,
    timeline: Vec<FrameId>,
    current_index: Option<usize>,
    named: HashMap<String, FrameId>,
    live_transients: HashSet<FrameId>,
    components: HashMap<ObjectId, HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

/// The top-level handle to a design: creates transient frames, commits or
/// discards them, and tracks the branching undo/redo history of stable
/// frames that result.
///
/// All mutating operations take `&self`; interior mutability is provided
/// by a single mutex guarding every piece of bookkeeping state, following
/// the same exclusive-access-for-mutation discipline as
/// [`crate::id::IdentityManager`]. Stable frames themselves never need
/// synchronized mutation, since they are never mutated once built.
pub struct Design {
    identity: Arc<IdentityManager>,
    metamodel: Arc<dyn Metamodel>,
    config: DesignConfig,
    inner: Mutex<Inner>,
}

impl Design {
    /// Creates an empty design with default configuration.
    pub fn new(metamodel: Arc<dyn Metamodel>) -> Self {
        Self::with_config(metamodel, DesignConfig::default())
    }

    /// Creates an empty design with explicit configuration.
    pub fn with_config(metamodel: Arc<dyn Metamodel>, config: DesignConfig) -> Self {
        Self {
            identity: Arc::new(IdentityManager::new()),
            metamodel,
            config,
            inner: Mutex::new(Inner {
                snapshots: EntityTable::new(),
                frames: EntityTable::new(),
                timeline: Vec::new(),
                current_index: None,
                named: HashMap::new(),
                live_transients: HashSet::new(),
                components: HashMap::new(),
            }),
        }
    }

    /// Opens a new transient frame derived from the current stable frame
    /// (or empty, if nothing has been accepted yet).
    pub fn create_frame(&self) -> TransientFrame {
        self.create_frame_with(None, None).expect("no proposed id can never collide")
    }

    /// Opens a new transient frame, with two optional overrides to the
    /// defaults [`Self::create_frame`] uses: `deriving` seeds the new
    /// frame from an explicit stable frame rather than the design's
    /// current one (useful for editing a historical or named frame
    /// without first making it current), and `proposed_id` claims a
    /// caller-chosen frame id instead of allocating a fresh one. Fails if
    /// `proposed_id` is already reserved or used.
    pub fn create_frame_with(
        &self,
        deriving: Option<Arc<StableFrame>>,
        proposed_id: Option<FrameId>,
    ) -> Result<TransientFrame, DesignError> {
        let frame_id = match proposed_id {
            Some(id) => {
                if !self.identity.reserve(id.raw(), IdKind::Frame) {
                    return Err(DesignError::DuplicateFrameId(id));
                }
                id
            }
            None => FrameId(self.identity.create_and_reserve(IdKind::Frame)),
        };
        let base = deriving.or_else(|| self.current_frame());
        let mut inner = self.inner.lock().expect("design mutex poisoned");
        inner.live_transients.insert(frame_id);
        drop(inner);
        Ok(TransientFrame::new(frame_id, base, Arc::clone(&self.identity), Arc::clone(&self.metamodel)))
    }

    /// The design's current stable frame, or `None` if nothing has been
    /// accepted yet.
    pub fn current_frame(&self) -> Option<Arc<StableFrame>> {
        let inner = self.inner.lock().expect("design mutex poisoned");
        let idx = inner.current_index?;
        let frame_id = inner.timeline[idx];
        inner.frames.lookup(frame_id).cloned()
    }

    /// Frames older than the current one, oldest first.
    pub fn undo_list(&self) -> Vec<FrameId> {
        let inner = self.inner.lock().expect("design mutex poisoned");
        match inner.current_index {
            Some(idx) => inner.timeline[..idx].to_vec(),
            None => Vec::new(),
        }
    }

    /// Frames newer than the current one, nearest first.
    pub fn redo_list(&self) -> Vec<FrameId> {
        let inner = self.inner.lock().expect("design mutex poisoned");
        match inner.current_index {
            Some(idx) => inner.timeline[idx + 1..].to_vec(),
            None => inner.timeline.clone(),
        }
    }

    /// Whether `id` names a stable frame this design currently retains
    /// (reachable from the timeline or a named binding).
    pub fn contains_frame(&self, id: FrameId) -> bool {
        let inner = self.inner.lock().expect("design mutex poisoned");
        inner.frames.contains(id)
    }

    /// Commits `frame`, producing a new stable frame and making it current.
    /// Any frames on the redo list are garbage collected, since accepting
    /// new work abandons that branch.
    ///
    /// On failure the frame is returned in the `Editing` state so the
    /// caller can fix it and retry, or discard it explicitly.
    pub fn accept(&self, frame: TransientFrame) -> Result<FrameId, AcceptFailure> {
        self.accept_inner(frame, None, true)
    }

    /// Like [`Self::accept`], additionally binding `name` to the resulting
    /// frame, replacing any previous binding of that name.
    pub fn accept_replacing_name(
        &self,
        frame: TransientFrame,
        name: impl Into<String>,
    ) -> Result<FrameId, AcceptFailure> {
        self.accept_inner(frame, Some(name.into()), true)
    }

    /// Commits `frame` without touching the undo/redo timeline: the
    /// resulting stable frame is built, validated, and retained (with an
    /// implicit reference, exactly like a freshly accepted one), but it
    /// never becomes current and is never visible on
    /// [`Self::undo_list`]/[`Self::redo_list`]. `name`, if given, binds it
    /// so it can be found again via [`Self::named_frame`] and released via
    /// [`Self::remove_frame`]; a frame accepted this way with no name has
    /// no automatic release path and is retrievable only through the
    /// returned `FrameId` and [`Self::frame`] for as long as the caller
    /// keeps that id, since neither `accept`'s redo-drop nor
    /// `max_undo_depth` eviction ever run over frames outside the
    /// timeline.
    pub fn accept_without_history(
        &self,
        frame: TransientFrame,
        name: Option<String>,
    ) -> Result<FrameId, AcceptFailure> {
        self.accept_inner(frame, name, false)
    }

    /// Looks up any stable frame this design currently retains by id,
    /// whether it is current, historical, named, or was accepted via
    /// [`Self::accept_without_history`].
    pub fn frame(&self, id: FrameId) -> Option<Arc<StableFrame>> {
        let inner = self.inner.lock().expect("design mutex poisoned");
        inner.frames.lookup(id).cloned()
    }

    fn accept_inner(
        &self,
        mut frame: TransientFrame,
        name: Option<String>,
        append_history: bool,
    ) -> Result<FrameId, AcceptFailure> {
        let transient_id = frame.frame_id();
        {
            let inner = self.inner.lock().expect("design mutex poisoned");
            if !inner.live_transients.contains(&transient_id) {
                return Err(AcceptFailure {
                    error: AcceptError::Design(DesignError::FrameNotOwned(transient_id)),
                    frame,
                });
            }
        }
        if frame.state() != TransientState::Editing {
            return Err(AcceptFailure { error: AcceptError::Design(DesignError::NotTransient), frame });
        }
        if let Err(e) = frame.validate_structure() {
            return Err(AcceptFailure { error: AcceptError::Structural(e), frame });
        }

        let reserved_objects = frame.reserved_object_ids().clone();
        let reserved_snapshots = frame.reserved_snapshot_ids().clone();
        let final_map = frame.accept_internal();

        let new_frame_id = transient_id;
        let stable = StableFrame::new(new_frame_id, final_map);

        if self.config.validate_constraints_on_accept {
            for violation in self.metamodel.checker().check(&stable) {
                tracing::warn!(
                    constraint = %violation.constraint,
                    objects = ?violation.objects,
                    frame = new_frame_id.raw(),
                    "constraint violation on accept"
                );
            }
        }

        let stable_arc = Arc::new(stable);

        for id in &reserved_objects {
            self.identity.mark_used(id.raw(), IdKind::Object);
        }
        for id in &reserved_snapshots {
            self.identity.mark_used(id.raw(), IdKind::Snapshot);
        }
        self.identity.mark_used(new_frame_id.raw(), IdKind::Frame);

        let mut inner = self.inner.lock().expect("design mutex poisoned");
        for snap in stable_arc.objects().values() {
            inner.snapshots.insert_or_retain(Arc::clone(snap));
        }
        inner.frames.insert_or_retain(Arc::clone(&stable_arc));

        if append_history {
            if let Some(idx) = inner.current_index {
                let dropped: Vec<FrameId> = inner.timeline.drain(idx + 1..).collect();
                for fid in dropped {
                    Self::gc_frame_locked(&mut inner, fid);
                }
            }
            inner.timeline.push(new_frame_id);
            inner.current_index = Some(inner.timeline.len() - 1);

            if let Some(max) = self.config.max_undo_depth {
                while inner.current_index.unwrap_or(0) > max {
                    let oldest = inner.timeline.remove(0);
                    inner.current_index = inner.current_index.map(|i| i - 1);
                    Self::gc_frame_locked(&mut inner, oldest);
                }
            }
        }

        inner.live_transients.remove(&transient_id);

        if let Some(name) = name {
            let previous = inner.named.insert(name, new_frame_id);
            inner.frames.retain(new_frame_id);
            if let Some(prev) = previous {
                Self::gc_frame_locked(&mut inner, prev);
            }
        }

        tracing::debug!(frame = new_frame_id.raw(), objects = stable_arc.object_count(), "accepted frame");
        Ok(new_frame_id)
    }

    /// Abandons `frame` without committing it, releasing every id it had
    /// reserved back to the identity manager.
    pub fn discard(&self, frame: TransientFrame) -> Result<(), DesignError> {
        let id = frame.frame_id();
        {
            let inner = self.inner.lock().expect("design mutex poisoned");
            if !inner.live_transients.contains(&id) {
                return Err(DesignError::FrameNotOwned(id));
            }
        }
        if frame.state() != TransientState::Editing {
            return Err(DesignError::NotTransient);
        }
        for object_id in frame.reserved_object_ids() {
            self.identity.release_reservation(object_id.raw());
        }
        for snapshot_id in frame.reserved_snapshot_ids() {
            self.identity.release_reservation(snapshot_id.raw());
        }
        self.identity.release_reservation(id.raw());

        let mut inner = self.inner.lock().expect("design mutex poisoned");
        inner.live_transients.remove(&id);
        drop(inner);
        tracing::debug!(frame = id.raw(), "discarded transient frame");
        Ok(())
    }

    /// Rewinds the current frame to `to`, which must be on the undo list.
    pub fn undo(&self, to: FrameId) -> Result<Arc<StableFrame>, DesignError> {
        let mut inner = self.inner.lock().expect("design mutex poisoned");
        let Some(cur) = inner.current_index else {
            return Err(DesignError::UnknownUndoTarget(to));
        };
        let Some(target) = inner.timeline[..cur].iter().position(|&f| f == to) else {
            return Err(DesignError::UnknownUndoTarget(to));
        };
        inner.current_index = Some(target);
        let frame_id = inner.timeline[target];
        let result = inner.frames.lookup(frame_id).cloned().expect("timeline entries are always live");
        tracing::debug!(frame = frame_id.raw(), "undo");
        Ok(result)
    }

    /// Fast-forwards the current frame to `to`, which must be on the redo
    /// list.
    pub fn redo(&self, to: FrameId) -> Result<Arc<StableFrame>, DesignError> {
        let mut inner = self.inner.lock().expect("design mutex poisoned");
        let start = inner.current_index.map(|i| i + 1).unwrap_or(0);
        let Some(offset) = inner.timeline[start..].iter().position(|&f| f == to) else {
            return Err(DesignError::UnknownRedoTarget(to));
        };
        let target = start + offset;
        inner.current_index = Some(target);
        let frame_id = inner.timeline[target];
        let result = inner.frames.lookup(frame_id).cloned().expect("timeline entries are always live");
        tracing::debug!(frame = frame_id.raw(), "redo");
        Ok(result)
    }

    /// Binds `name` to `id`, replacing any previous binding. `id` must be
    /// a stable frame this design currently retains.
    pub fn name_frame(&self, name: impl Into<String>, id: FrameId) -> Result<(), DesignError> {
        let mut inner = self.inner.lock().expect("design mutex poisoned");
        if !inner.frames.contains(id) {
            return Err(DesignError::UnknownFrame(id));
        }
        inner.frames.retain(id);
        let previous = inner.named.insert(name.into(), id);
        if let Some(prev) = previous {
            Self::gc_frame_locked(&mut inner, prev);
        }
        Ok(())
    }

    /// The stable frame bound to `name`, if any.
    pub fn named_frame(&self, name: &str) -> Option<Arc<StableFrame>> {
        let inner = self.inner.lock().expect("design mutex poisoned");
        let id = *inner.named.get(name)?;
        inner.frames.lookup(id).cloned()
    }

    /// Drops a named binding to `id`, releasing this design's extra
    /// reference to it. Returns an error if `id` has no named binding
    /// (frames reachable only from the undo/redo timeline are released
    /// automatically by `accept`/`undo`, not through this method).
    pub fn remove_frame(&self, id: FrameId) -> Result<(), DesignError> {
        let mut inner = self.inner.lock().expect("design mutex poisoned");
        let names: Vec<String> =
            inner.named.iter().filter(|&(_, &fid)| fid == id).map(|(k, _)| k.clone()).collect();
        if names.is_empty() {
            return Err(DesignError::UnknownFrame(id));
        }
        for name in names {
            inner.named.remove(&name);
        }
        Self::gc_frame_locked(&mut inner, id);
        Ok(())
    }

    /// Checks the current stable frame against the metamodel's constraint
    /// checker. Fails if there is no current frame yet, or if the frame
    /// violates any constraint; use [`Self::check_constraints`] for a
    /// non-failing diagnostic pass.
    pub fn validate(&self) -> Result<ValidatedFrame, ValidateError> {
        let frame = self.current_frame().ok_or(DesignError::NoCurrentFrame)?;
        let violations = self.metamodel.checker().check(&frame);
        if violations.is_empty() {
            Ok(ValidatedFrame { frame, metamodel: Arc::clone(&self.metamodel) })
        } else {
            Err(FrameValidationError { violations }.into())
        }
    }

    /// Checks an arbitrary retained stable frame (current, historical, or
    /// named) against the metamodel's constraint checker.
    pub fn check_constraints(&self, id: FrameId) -> Result<Vec<ConstraintViolation>, DesignError> {
        let inner = self.inner.lock().expect("design mutex poisoned");
        let frame = inner.frames.lookup(id).cloned().ok_or(DesignError::UnknownFrame(id))?;
        drop(inner);
        Ok(self.metamodel.checker().check(&frame))
    }

    /// Attaches a non-persisted runtime component of type `T` to `id`,
    /// replacing any existing component of the same type. Components are
    /// pure side-table state: never part of a snapshot, never touched by
    /// `accept`/`undo`/`redo`.
    pub fn set_component<T: Send + Sync + 'static>(&self, id: ObjectId, component: T) {
        let mut inner = self.inner.lock().expect("design mutex poisoned");
        inner.components.entry(id).or_default().insert(TypeId::of::<T>(), Box::new(component));
    }

    /// Returns a clone of `id`'s component of type `T`, if one is set.
    pub fn component<T: Clone + Send + Sync + 'static>(&self, id: ObjectId) -> Option<T> {
        let inner = self.inner.lock().expect("design mutex poisoned");
        inner.components.get(&id)?.get(&TypeId::of::<T>())?.downcast_ref::<T>().cloned()
    }

    /// Removes `id`'s component of type `T`, if any. Returns whether one
    /// was present.
    pub fn remove_component<T: Send + Sync + 'static>(&self, id: ObjectId) -> bool {
        let mut inner = self.inner.lock().expect("design mutex poisoned");
        inner.components.get_mut(&id).map(|m| m.remove(&TypeId::of::<T>()).is_some()).unwrap_or(false)
    }

    fn gc_frame_locked(inner: &mut Inner, frame_id: FrameId) {
        let existing = inner.frames.lookup(frame_id).cloned();
        let removed = inner.frames.release(frame_id);
        if removed {
            if let Some(stable) = existing {
                for snapshot in stable.snapshots() {
                    inner.snapshots.release(snapshot.snapshot_id());
                }
            }
            tracing::debug!(frame = frame_id.raw(), "garbage collected stable frame");
        }
    }
}
