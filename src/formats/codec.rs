use std::path::Path;

use crate::model::Video;

use super::{Result, read_video, supported_video_formats};

pub trait VideoReader: Send + Sync {
    /// `extension` is lowercase and without the dot.
    fn supports_extension(&self, extension: &str) -> bool;
    fn read(&self, path: &Path) -> Result<Video>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultVideoCodec;

impl VideoReader for DefaultVideoCodec {
    fn supports_extension(&self, extension: &str) -> bool {
        supported_video_formats().contains(&extension)
    }

    fn read(&self, path: &Path) -> Result<Video> {
        read_video(path)
    }
}
