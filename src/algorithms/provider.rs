use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array2, Array3, ArrayView3, Zip};

use crate::jobs::CancellationToken;
use crate::model::{LabelMap, MotionCorrectionParams, RoiBounds};

use super::error::ensure_same_shape;
use super::{AlgorithmError, Result};
use super::{filters, intensity, registration, segmentation, traces};

pub type Image = Array2<f32>;
pub type Mask = Array2<bool>;

#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub mask: Mask,
    /// Input image with everything outside `mask` zeroed.
    pub intermediate: Image,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRois {
    pub label_map: LabelMap,
    pub areas: BTreeMap<u32, f32>,
    pub circularities: BTreeMap<u32, f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoiFilterResult {
    pub kept: BTreeSet<u32>,
    pub filtered_out: BTreeSet<u32>,
}

/// Centroids are `(x, y)` rows; traces are laid out as (time, roi) in `labels` order.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiTraces {
    pub labels: Vec<u32>,
    pub centroids: Array2<f32>,
    pub traces: Array2<f32>,
}

/// Numeric building blocks used by detection, motion correction and batch export.
pub trait AlgorithmProvider: Send + Sync {
    fn adjust_image(&self, mean_image: &Image, contrast: f32, gamma: f32) -> Image;

    fn background_mask(&self, mean_image: &Image, threshold: f32, dynamic_range_max: f32) -> Mask;

    fn equalize(
        &self,
        image: &Image,
        background: &Mask,
        window_size: usize,
        dynamic_range_max: f32,
    ) -> Result<Image>;

    fn segment(&self, image: &Image, threshold: f32) -> Result<Segmentation>;

    /// Labels the foreground of `mask`; `intermediate` and `mean_image` are the segmented
    /// image and the raw plane average it came from.
    fn extract_rois(
        &self,
        mask: &Mask,
        intermediate: &Image,
        mean_image: &Image,
    ) -> Result<ExtractedRois>;

    fn filter_rois(
        &self,
        mean_image: &Image,
        label_map: &LabelMap,
        bounds: &RoiBounds,
        areas: &BTreeMap<u32, f32>,
        circularities: &BTreeMap<u32, f32>,
    ) -> RoiFilterResult;

    fn motion_correct(
        &self,
        frames: ArrayView3<'_, f32>,
        params: &MotionCorrectionParams,
        progress: &mut dyn FnMut(f32),
        cancel: &CancellationToken,
    ) -> Result<Array3<f32>>;

    fn estimate_shift(&self, reference: &Image, moving: &Image) -> Result<(i32, i32)>;

    fn centroids_and_traces(
        &self,
        label_map: &LabelMap,
        frames: ArrayView3<'_, f32>,
    ) -> Result<RoiTraces>;

    fn smooth(&self, image: &Image) -> Image;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAlgorithms;

const SMOOTHING_SIGMA: f32 = 1.0;

impl AlgorithmProvider for DefaultAlgorithms {
    fn adjust_image(&self, mean_image: &Image, contrast: f32, gamma: f32) -> Image {
        intensity::adjust_image(mean_image, contrast, gamma)
    }

    fn background_mask(&self, mean_image: &Image, threshold: f32, dynamic_range_max: f32) -> Mask {
        intensity::background_mask(mean_image, threshold, dynamic_range_max)
    }

    fn equalize(
        &self,
        image: &Image,
        background: &Mask,
        window_size: usize,
        dynamic_range_max: f32,
    ) -> Result<Image> {
        ensure_same_shape(image.dim(), background.dim())?;
        if window_size == 0 {
            return Err(AlgorithmError::InvalidParams(
                "equalization window must be at least 1".into(),
            ));
        }
        if dynamic_range_max.is_nan() || dynamic_range_max <= 0.0 {
            return Err(AlgorithmError::InvalidParams(format!(
                "dynamic range maximum must be positive, got {dynamic_range_max}"
            )));
        }
        Ok(intensity::equalize(
            image,
            background,
            window_size,
            dynamic_range_max,
        ))
    }

    fn segment(&self, image: &Image, threshold: f32) -> Result<Segmentation> {
        if image.is_empty() {
            return Err(AlgorithmError::EmptyInput("segmentation image".into()));
        }
        Ok(segmentation::segment(image, threshold))
    }

    fn extract_rois(
        &self,
        mask: &Mask,
        intermediate: &Image,
        mean_image: &Image,
    ) -> Result<ExtractedRois> {
        ensure_same_shape(mask.dim(), intermediate.dim())?;
        ensure_same_shape(mask.dim(), mean_image.dim())?;
        let foreground = Zip::from(mask)
            .and(intermediate)
            .map_collect(|inside, value| *inside && *value > 0.0);
        Ok(segmentation::extract_rois(&foreground))
    }

    fn filter_rois(
        &self,
        _mean_image: &Image,
        label_map: &LabelMap,
        bounds: &RoiBounds,
        areas: &BTreeMap<u32, f32>,
        circularities: &BTreeMap<u32, f32>,
    ) -> RoiFilterResult {
        segmentation::filter_rois(label_map, bounds, areas, circularities)
    }

    fn motion_correct(
        &self,
        frames: ArrayView3<'_, f32>,
        params: &MotionCorrectionParams,
        progress: &mut dyn FnMut(f32),
        cancel: &CancellationToken,
    ) -> Result<Array3<f32>> {
        registration::motion_correct_frames(frames, params, progress, cancel)
    }

    fn estimate_shift(&self, reference: &Image, moving: &Image) -> Result<(i32, i32)> {
        registration::estimate_shift(reference, moving)
    }

    fn centroids_and_traces(
        &self,
        label_map: &LabelMap,
        frames: ArrayView3<'_, f32>,
    ) -> Result<RoiTraces> {
        traces::centroids_and_traces(label_map, frames)
    }

    fn smooth(&self, image: &Image) -> Image {
        filters::gaussian_blur(image, SMOOTHING_SIGMA)
    }
}
