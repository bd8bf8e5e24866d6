//! Tunables for a [`crate::design::Design`] instance. Kept deliberately
//! small: the engine has no durable storage or background workers to
//! configure, just the handful of knobs that affect memory retention and
//! validation behavior.

/// Configuration for a [`crate::design::Design`].
#[derive(Debug, Clone)]
pub struct DesignConfig {
    /// Maximum number of stable frames retained on the undo list before
    /// the oldest are garbage collected. `None` means unbounded.
    pub max_undo_depth: Option<usize>,
    /// Whether `accept` also runs the metamodel's constraint checker
    /// (producing a [`crate::error::FrameValidationError`] rather than a
    /// hard failure) in addition to structural validation.
    pub validate_constraints_on_accept: bool,
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self {
            max_undo_depth: None,
            validate_constraints_on_accept: false,
        }
    }
}
