use thiserror::Error;

pub type Result<T> = std::result::Result<T, AlgorithmError>;

#[derive(Debug, Error)]
pub enum AlgorithmError {
    #[error("invalid algorithm parameters: {0}")]
    InvalidParams(String),

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("algorithm cancelled")]
    Cancelled,
}

pub(crate) fn ensure_same_shape(expected: (usize, usize), found: (usize, usize)) -> Result<()> {
    if expected != found {
        return Err(AlgorithmError::ShapeMismatch { expected, found });
    }
    Ok(())
}
