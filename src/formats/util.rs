use std::path::{Path, PathBuf};

use super::{FormatError, Result};

pub(crate) fn extension(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .ok_or_else(|| FormatError::UnsupportedFormat(path.to_string_lossy().to_string()))?;
    Ok(ext)
}

/// `<video dir>/<video stem>/`, where batch results for one video are written.
pub fn output_dir_for(video_path: &Path) -> PathBuf {
    let parent = video_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = video_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    parent.join(stem)
}

/// Per-plane artifact paths inside a batch output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneOutputs {
    pub rois: PathBuf,
    pub traces: PathBuf,
    pub centroids: PathBuf,
}

impl PlaneOutputs {
    pub fn new(directory: &Path, z: usize) -> Self {
        Self {
            rois: directory.join(format!("z_{z}_rois.tif")),
            traces: directory.join(format!("z_{z}_traces.csv")),
            centroids: directory.join(format!("z_{z}_centroids.csv")),
        }
    }
}
