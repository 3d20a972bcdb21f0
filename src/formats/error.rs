use crate::model::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FormatError>;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported data layout for this format: {0}")]
    UnsupportedLayout(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode/encode failure: {0}")]
    Image(#[from] image::ImageError),

    #[error("TIFF decode/encode failure: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("CSV failure: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid video: {0}")]
    Core(#[from] CoreError),
}
