//! An in-memory, versioned object-graph store.
//!
//! A [`design::Design`] holds a branching history of immutable
//! [`frame::StableFrame`]s. Changes happen inside a
//! [`frame::TransientFrame`]: a mutable working copy opened from the
//! current stable frame, edited with [`frame::TransientFrame::create`],
//! [`frame::TransientFrame::mutate`], [`frame::TransientFrame::add_child`],
//! and [`frame::TransientFrame::remove_cascading`], then either committed
//! with [`design::Design::accept`] (producing a new stable frame and
//! advancing the history) or abandoned with [`design::Design::discard`].
//!
//! Objects that are untouched between two stable frames share their
//! underlying [`snapshot::ObjectSnapshot`] by reference count rather than
//! being copied; [`entity_table::EntityTable`] is the reusable container
//! both the snapshot pool and the stable-frame pool are built on.
//!
//! Two external collaborators are expressed as traits rather than concrete
//! types, since a real metamodel and constraint library live in a separate
//! crate: [`metamodel::Metamodel`] and [`metamodel::ConstraintChecker`].
//! [`metamodel::SimpleMetamodel`] is a small fixture implementation shipped
//! for tests and examples.
//!
//! # Non-goals
//!
//! This crate has no durable storage, no multi-process concurrency, and no
//! schema migration story. A [`design::Design`] lives and dies with the
//! process that created it.

pub mod config;
pub mod design;
pub mod entity_table;
pub mod error;
pub mod frame;
pub mod id;
pub mod metamodel;
pub mod ordered_set;
pub mod snapshot;
pub mod structure;
pub mod validator;
pub mod variant;

pub use config::DesignConfig;
pub use design::{Design, ValidatedFrame};
pub use error::{
    AcceptError, AcceptFailure, DesignError, FrameValidationError, StructuralIntegrityError, ValidateError,
};
pub use frame::{EdgeView, StableFrame, TransientFrame, TransientState};
pub use id::{FrameId, IdentityManager, ObjectId, SnapshotId};
pub use metamodel::{AttributeSchema, ConstraintChecker, ConstraintViolation, Metamodel, SimpleMetamodel};
pub use snapshot::{resolve_attribute, ObjectSnapshot, ObjectView, TransientObject, RESERVED_ATTRIBUTE_NAMES};
pub use structure::{Structure, StructuralKind};
pub use variant::{Atom, Variant};
