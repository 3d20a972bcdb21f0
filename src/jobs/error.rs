use thiserror::Error;

use crate::algorithms::AlgorithmError;
use crate::formats::FormatError;
use crate::model::CoreError;

pub type Result<T> = std::result::Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    /// Cooperative stop requested through the job's token; never shown as a failure.
    #[error("job cancelled")]
    Cancelled,

    #[error("degenerate result: {0}")]
    DegenerateResult(String),

    #[error("algorithm failure: {0}")]
    Algorithm(#[source] AlgorithmError),

    #[error("format failure: {0}")]
    Format(#[from] FormatError),

    #[error("invalid input: {0}")]
    Input(#[from] CoreError),

    #[error("plane {z} is out of range for a video with {planes} planes")]
    PlaneOutOfRange { z: usize, planes: usize },

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl From<AlgorithmError> for JobError {
    fn from(error: AlgorithmError) -> Self {
        match error {
            AlgorithmError::Cancelled => Self::Cancelled,
            other => Self::Algorithm(other),
        }
    }
}
