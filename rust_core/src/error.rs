use thiserror::Error;

use crate::store::VarKey;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of store access and gradient computation.
///
/// Non-finite gradients are deliberately absent: they are reported by
/// [`crate::gradient::verify_gradient`] and left to the caller's policy.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown variable `{0}`")]
    UnknownVariable(VarKey),

    #[error("variable `{0}` is already in the store")]
    DuplicateVariable(VarKey),

    #[error("position {position} is out of range for `{key}` (dimension {dim})")]
    PositionOutOfRange {
        key: VarKey,
        position: usize,
        dim: usize,
    },

    #[error("expected {expected} values, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("chunk width must be at least 1, got {0}")]
    InvalidChunkWidth(usize),

    #[error("initial point has a non-finite log density or gradient")]
    NonFiniteStart,

    /// Raised by the model itself; passed through untouched.
    #[error(transparent)]
    Model(#[from] anyhow::Error),
}
