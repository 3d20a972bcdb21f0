use thiserror::Error;

use crate::algorithms::AlgorithmError;
use crate::formats::FormatError;
use crate::model::CoreError;

use super::Mode;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The request does not apply in the current state; callers may ignore it.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("cannot switch from {from:?} to {to:?}")]
    InvalidTransition { from: Mode, to: Mode },

    #[error("plane {z} is out of range for a video with {planes} planes")]
    PlaneOutOfRange { z: usize, planes: usize },

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("no video is loaded")]
    NoVideo,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Algorithm(#[from] AlgorithmError),

    #[error(transparent)]
    Format(#[from] FormatError),
}
