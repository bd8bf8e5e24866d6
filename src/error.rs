//! The three error surfaces the design engine exposes (see the crate's
//! error-handling notes): structural integrity failures raised while
//! committing a transient frame, constraint-validation diagnostics raised
//! against a metamodel, and a catch-all for programming errors — duplicate
//! or unknown ids, mutating a non-transient frame, and the like. All three
//! are `thiserror`-derived and `Result`-transported; none of them panic.

use crate::id::{FrameId, ObjectId, SnapshotId};
use crate::metamodel::ConstraintViolation;
use crate::structure::StructuralKind;

/// Raised by [`crate::frame::TransientFrame::validate_structure`] and by
/// `Design::accept` when a frame's graph shape violates one of the
/// referential or parent/child invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralIntegrityError {
    /// An edge endpoint or ordered-set owner/item is missing from the frame.
    #[error("object {object} references missing object {target}")]
    BrokenStructureReference {
        /// The object whose structure references something missing.
        object: ObjectId,
        /// The missing referenced object.
        target: ObjectId,
    },
    /// A listed child does not exist in the frame.
    #[error("object {parent} lists missing child {child}")]
    BrokenChild {
        /// The object whose children list is broken.
        parent: ObjectId,
        /// The missing child.
        child: ObjectId,
    },
    /// A listed parent does not exist in the frame.
    #[error("object {child} has missing parent {parent}")]
    BrokenParent {
        /// The object whose parent is missing.
        child: ObjectId,
        /// The missing parent.
        parent: ObjectId,
    },
    /// A parent/child relationship is not mutual.
    #[error("parent/child relationship between {a} and {b} is not mutual")]
    ParentChildMismatch {
        /// One side of the mismatched relationship.
        a: ObjectId,
        /// The other side.
        b: ObjectId,
    },
    /// The parent relation contains a cycle.
    #[error("parent/child relation contains a cycle")]
    ParentChildCycle,
    /// An edge endpoint is not a `Node`, or an ordered-set item is itself
    /// an `OrderedSet`.
    #[error("object {object} has a structural endpoint {endpoint} of the wrong kind")]
    EdgeEndpointNotANode {
        /// The object whose structure carries the wrongly-typed endpoint.
        object: ObjectId,
        /// The endpoint with the wrong structural kind.
        endpoint: ObjectId,
    },
}

/// Raised by `Design::validate` when a stable frame fails one or more of
/// its metamodel's constraints. The frame itself is already stable;
/// validation only produces diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("frame failed {} constraint(s)", .violations.len())]
pub struct FrameValidationError {
    /// Every constraint violation found.
    pub violations: Vec<ConstraintViolation>,
}

/// Catch-all for what the design engine's contract calls "programming
/// errors": violations of a precondition the caller controls (duplicate
/// ids, unknown ids, mutating a non-transient frame, undo/redo to an id
/// that was never accepted). These are never expected to be handled by
/// calling code beyond matching on them in tests or assertions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DesignError {
    /// `create` or `insert` used an object id that is already live.
    #[error("object id {0} is already in use")]
    DuplicateObjectId(ObjectId),
    /// `create` or `insert` used a snapshot id that is already live.
    #[error("snapshot id {0} is already in use")]
    DuplicateSnapshotId(SnapshotId),
    /// `accept` targeted a frame id that is already a stable frame.
    #[error("frame id {0} is already in use")]
    DuplicateFrameId(FrameId),
    /// Looked up an object id absent from the frame.
    #[error("unknown object id {0}")]
    UnknownObjectId(ObjectId),
    /// Looked up a frame id absent from the design.
    #[error("unknown frame id {0}")]
    UnknownFrame(FrameId),
    /// `create` named a type the metamodel does not know.
    #[error("unknown type '{0}'")]
    UnknownType(String),
    /// `add_child` targeted a child that already has a parent.
    #[error("object {child} already has a parent")]
    AlreadyHasParent {
        /// The child with an existing parent.
        child: ObjectId,
    },
    /// `create` was given a `Structure` whose kind does not match the
    /// type's declared structural kind, or an `Edge`/`OrderedSet` type was
    /// created without an explicit structure.
    #[error(
        "structure kind mismatch for type '{type_name}': expected {expected:?}, found {found:?}"
    )]
    StructureKindMismatch {
        /// The object type being created.
        type_name: String,
        /// The structural kind declared by the metamodel.
        expected: StructuralKind,
        /// The structural kind actually supplied, if any.
        found: Option<StructuralKind>,
    },
    /// A proposed id is already reserved or used under a different kind.
    #[error("id {0} is already reserved or in use under a different kind")]
    IdInUse(u64),
    /// An operation that requires the `Transient` state was attempted on a
    /// frame that has already been accepted or discarded.
    #[error("frame is not in the Transient state")]
    NotTransient,
    /// `accept`/`discard` was given a frame this design did not create.
    #[error("frame {0} is not owned by this design")]
    FrameNotOwned(FrameId),
    /// `undo` was given an id absent from the undo list.
    #[error("{0} is not a member of the undo list")]
    UnknownUndoTarget(FrameId),
    /// `redo` was given an id absent from the redo list.
    #[error("{0} is not a member of the redo list")]
    UnknownRedoTarget(FrameId),
    /// `validate`/`current_frame` was called before any frame was ever
    /// accepted.
    #[error("design has no current frame yet")]
    NoCurrentFrame,
}

/// Raised by `Design::validate` itself: either there is no current frame to
/// check, or the current frame failed one or more constraints.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidateError {
    /// No frame has ever been accepted yet.
    #[error(transparent)]
    Design(#[from] DesignError),
    /// The frame failed its metamodel's constraints.
    #[error(transparent)]
    Constraints(#[from] FrameValidationError),
}

/// The outcome of a failed `Design::accept`/`accept_replacing_name` call:
/// either the frame's graph shape was invalid, or a programming
/// precondition was violated.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AcceptError {
    /// The frame failed structural validation.
    #[error(transparent)]
    Structural(#[from] StructuralIntegrityError),
    /// A programming precondition was violated.
    #[error(transparent)]
    Design(#[from] DesignError),
}

/// Returned by `Design::accept`/`accept_replacing_name` on failure. Carries
/// the transient frame back to the caller so it can be retried (after
/// fixing whatever made it invalid) or explicitly discarded, rather than
/// being silently dropped along with its in-progress edits.
#[derive(Debug)]
pub struct AcceptFailure {
    /// The frame that failed to commit, still in the `Editing` state.
    pub frame: crate::frame::TransientFrame,
    /// Why the commit was rejected.
    pub error: AcceptError,
}

impl std::fmt::Display for AcceptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for AcceptFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
