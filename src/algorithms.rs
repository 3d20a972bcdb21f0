mod error;
mod filters;
mod intensity;
mod morphology;
mod provider;
mod registration;
mod segmentation;
mod traces;


pub use error::{AlgorithmError, Result};
pub use filters::{gaussian_blur, local_extrema};
pub use intensity::{adjust_image, background_mask, equalize, to_display_range};
pub use morphology::{dilate, disk_mask, disk_offsets, erode, polygon_mask, rect_mask};
pub use provider::{
    AlgorithmProvider, DefaultAlgorithms, ExtractedRois, Image, Mask, RoiFilterResult, RoiTraces,
    Segmentation,
};
pub use registration::{estimate_shift, motion_correct_frames, translate};
pub use segmentation::{
    extract_rois, filter_rois, measure_label, measure_labels, otsu_threshold, segment,
};
pub use traces::{centroids_and_traces, roi_activity};
