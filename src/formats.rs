mod api;
mod archive;
mod codec;
mod error;
mod tables;
mod tiff;
mod util;

#[cfg(test)]
mod tests;

pub use api::{
    read_label_map, read_video, save_png, supported_video_formats, write_label_map, write_video,
};
pub use archive::{PlaneArchive, RoiArchive, load_roi_archive, save_roi_archive};
pub use codec::{DefaultVideoCodec, VideoReader};
pub use error::{FormatError, Result};
pub use tables::{write_centroids_csv, write_traces_csv};
pub use util::{PlaneOutputs, output_dir_for};
