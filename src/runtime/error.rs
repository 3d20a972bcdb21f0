use thiserror::Error;

use crate::algorithms::AlgorithmError;
use crate::formats::FormatError;
use crate::jobs::JobError;
use crate::model::CoreError;
use crate::session::SessionError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("input error: {0}")]
    Input(#[from] CoreError),

    #[error("algorithm error: {0}")]
    Algorithm(#[from] AlgorithmError),

    #[error("job error: {0}")]
    Job(#[from] JobError),

    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),
}
