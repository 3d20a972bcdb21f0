mod error;
mod label_map;
mod params;
mod roi_sets;
mod video;


pub use error::{CoreError, Result};
pub use label_map::{
    LabelMap, Point, label_at, label_mask, label_set, max_label, paint, pixel_count,
    shift_label_map, without_labels,
};
pub use params::{
    ConfigValue, MotionCorrectionParams, Params, RoiBounds, load_params, save_params,
};
pub use roi_sets::RoiSets;
pub use video::{DYNAMIC_RANGE_BUCKETS, Video, dynamic_range_bucket};
