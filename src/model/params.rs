use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{CoreError, Result};

/// Area and circularity window an ROI must fall inside to survive automatic filtering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiBounds {
    pub min_area: f32,
    pub max_area: f32,
    pub min_circ: f32,
    pub max_circ: f32,
}

impl RoiBounds {
    pub fn contains(&self, area: f32, circularity: f32) -> bool {
        area >= self.min_area
            && area <= self.max_area
            && circularity >= self.min_circ
            && circularity <= self.max_circ
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionCorrectionParams {
    pub max_shift: usize,
    pub patch_stride: usize,
    pub patch_overlap: usize,
}

/// User-tunable settings shared by the interactive session and the batch runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub contrast: f32,
    pub gamma: f32,
    pub fps: f32,
    pub background_threshold: f32,
    pub window_size: usize,
    pub soma_threshold: f32,
    pub min_area: f32,
    pub max_area: f32,
    pub min_circ: f32,
    pub max_circ: f32,
    pub max_shift: usize,
    pub patch_stride: usize,
    pub patch_overlap: usize,
    /// Overrides the dynamic-range bucket derived from the loaded video.
    pub dynamic_range_max: Option<f32>,
    pub invert_masks: bool,
    pub use_mc_video: bool,
    pub mc_current_z: bool,
    pub motion_correct_all_videos: bool,
    pub apply_blur: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            contrast: 1.0,
            gamma: 1.0,
            fps: 60.0,
            background_threshold: 10.0,
            window_size: 7,
            soma_threshold: 1.0,
            min_area: 10.0,
            max_area: 100.0,
            min_circ: 0.0,
            max_circ: 2.0,
            max_shift: 6,
            patch_stride: 24,
            patch_overlap: 6,
            dynamic_range_max: None,
            invert_masks: false,
            use_mc_video: false,
            mc_current_z: false,
            motion_correct_all_videos: false,
            apply_blur: false,
        }
    }
}

/// A single setting change requested by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigValue {
    Contrast(f32),
    Gamma(f32),
    Fps(f32),
    BackgroundThreshold(f32),
    WindowSize(usize),
    SomaThreshold(f32),
    MinArea(f32),
    MaxArea(f32),
    MinCirc(f32),
    MaxCirc(f32),
    MaxShift(usize),
    PatchStride(usize),
    PatchOverlap(usize),
    DynamicRangeMax(Option<f32>),
    InvertMasks(bool),
    UseMotionCorrected(bool),
    MotionCorrectCurrentPlane(bool),
    MotionCorrectAllVideos(bool),
    ApplyBlur(bool),
}

impl Params {
    pub fn roi_bounds(&self) -> RoiBounds {
        RoiBounds {
            min_area: self.min_area,
            max_area: self.max_area,
            min_circ: self.min_circ,
            max_circ: self.max_circ,
        }
    }

    pub fn motion_correction(&self) -> MotionCorrectionParams {
        MotionCorrectionParams {
            max_shift: self.max_shift,
            patch_stride: self.patch_stride,
            patch_overlap: self.patch_overlap,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.gamma > 0.0) {
            return Err(CoreError::InvalidParams("`gamma` must be > 0".to_string()));
        }
        if self.contrast < 0.0 {
            return Err(CoreError::InvalidParams("`contrast` must be >= 0".to_string()));
        }
        if self.window_size == 0 {
            return Err(CoreError::InvalidParams(
                "`window_size` must be at least 1".to_string(),
            ));
        }
        if self.min_area > self.max_area {
            return Err(CoreError::InvalidParams(
                "`min_area` must not exceed `max_area`".to_string(),
            ));
        }
        if self.min_circ > self.max_circ {
            return Err(CoreError::InvalidParams(
                "`min_circ` must not exceed `max_circ`".to_string(),
            ));
        }
        if let Some(max) = self.dynamic_range_max {
            if !(max > 0.0) {
                return Err(CoreError::InvalidParams(
                    "`dynamic_range_max` must be > 0".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Applies one change, leaving `self` untouched when the result would be invalid.
    pub fn apply(&mut self, value: ConfigValue) -> Result<()> {
        let mut next = self.clone();
        match value {
            ConfigValue::Contrast(v) => next.contrast = v,
            ConfigValue::Gamma(v) => next.gamma = v,
            ConfigValue::Fps(v) => next.fps = v,
            ConfigValue::BackgroundThreshold(v) => next.background_threshold = v,
            ConfigValue::WindowSize(v) => next.window_size = v,
            ConfigValue::SomaThreshold(v) => next.soma_threshold = v,
            ConfigValue::MinArea(v) => next.min_area = v,
            ConfigValue::MaxArea(v) => next.max_area = v,
            ConfigValue::MinCirc(v) => next.min_circ = v,
            ConfigValue::MaxCirc(v) => next.max_circ = v,
            ConfigValue::MaxShift(v) => next.max_shift = v,
            ConfigValue::PatchStride(v) => next.patch_stride = v,
            ConfigValue::PatchOverlap(v) => next.patch_overlap = v,
            ConfigValue::DynamicRangeMax(v) => next.dynamic_range_max = v,
            ConfigValue::InvertMasks(v) => next.invert_masks = v,
            ConfigValue::UseMotionCorrected(v) => next.use_mc_video = v,
            ConfigValue::MotionCorrectCurrentPlane(v) => next.mc_current_z = v,
            ConfigValue::MotionCorrectAllVideos(v) => next.motion_correct_all_videos = v,
            ConfigValue::ApplyBlur(v) => next.apply_blur = v,
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    matches!(extension.as_str(), "yaml" | "yml")
}

pub fn load_params(path: impl AsRef<Path>) -> Result<Params> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)?;
    let params = if is_yaml(path) {
        serde_yaml::from_str::<Params>(&raw)?
    } else {
        serde_json::from_str::<Params>(&raw)?
    };
    params.validate()?;
    Ok(params)
}

pub fn save_params(path: impl AsRef<Path>, params: &Params) -> Result<()> {
    let path = path.as_ref();
    let serialized = if is_yaml(path) {
        serde_yaml::to_string(params)?
    } else {
        serde_json::to_string_pretty(params)?
    };
    fs::write(path, serialized)?;
    Ok(())
}
