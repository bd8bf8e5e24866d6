//! Stable and transient frames: the two faces of a design's object graph
//! at a given moment — immutable-and-shared, or open-and-private.

mod stable;
mod transient;

pub use stable::{EdgeView, StableFrame};
pub use transient::{TransientFrame, TransientState};
