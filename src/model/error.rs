use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("video has {ndim} dimensions; at least 3 (time, row, column) are required")]
    NotEnoughDimensions { ndim: usize },

    #[error("video has {ndim} dimensions; at most 4 (time, plane, row, column) are supported")]
    TooManyDimensions { ndim: usize },

    #[error("invalid dimension size 0 at axis {axis}")]
    ZeroSizedDimension { axis: usize },

    #[error("label map shape {found:?} does not match frame shape {expected:?}")]
    LabelShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("parameter file I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("parameter JSON failure: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("parameter YAML failure: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
}
