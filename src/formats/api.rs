use std::path::Path;

use image::RgbImage;

use crate::model::{LabelMap, Video};

use super::tiff::{read_label_map_tiff, read_video_tiff, write_label_map_tiff, write_video_tiff};
use super::util::extension;
use super::{FormatError, Result};

pub fn read_video(path: impl AsRef<Path>) -> Result<Video> {
    let path = path.as_ref();
    match extension(path)?.as_str() {
        "tif" | "tiff" => read_video_tiff(path),
        other => Err(FormatError::UnsupportedFormat(other.to_string())),
    }
}

pub fn write_video(path: impl AsRef<Path>, video: &Video) -> Result<()> {
    let path = path.as_ref();
    match extension(path)?.as_str() {
        "tif" | "tiff" => write_video_tiff(path, video),
        other => Err(FormatError::UnsupportedFormat(other.to_string())),
    }
}

pub fn write_label_map(path: impl AsRef<Path>, labels: &LabelMap) -> Result<()> {
    let path = path.as_ref();
    match extension(path)?.as_str() {
        "tif" | "tiff" => write_label_map_tiff(path, labels),
        other => Err(FormatError::UnsupportedFormat(other.to_string())),
    }
}

pub fn read_label_map(path: impl AsRef<Path>) -> Result<LabelMap> {
    let path = path.as_ref();
    match extension(path)?.as_str() {
        "tif" | "tiff" => read_label_map_tiff(path),
        other => Err(FormatError::UnsupportedFormat(other.to_string())),
    }
}

pub fn save_png(path: impl AsRef<Path>, image: &RgbImage) -> Result<()> {
    let path = path.as_ref();
    match extension(path)?.as_str() {
        "png" => {
            image.save(path)?;
            Ok(())
        }
        other => Err(FormatError::UnsupportedFormat(other.to_string())),
    }
}

pub fn supported_video_formats() -> &'static [&'static str] {
    &["tif", "tiff"]
}
