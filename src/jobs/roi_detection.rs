use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ndarray::Zip;

use crate::algorithms::{AlgorithmError, AlgorithmProvider, Image, Mask, Segmentation};
use crate::model::{LabelMap, Params, RoiBounds};

use super::{Job, JobContext, JobKind, JobOutput, Result};

/// Parameter snapshot taken when detection starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionSettings {
    pub contrast: f32,
    pub gamma: f32,
    pub background_threshold: f32,
    pub window_size: usize,
    pub soma_threshold: f32,
    pub dynamic_range_max: f32,
    pub bounds: RoiBounds,
}

impl DetectionSettings {
    pub fn from_params(params: &Params, dynamic_range_max: f32) -> Self {
        Self {
            contrast: params.contrast,
            gamma: params.gamma,
            background_threshold: params.background_threshold,
            window_size: params.window_size,
            soma_threshold: params.soma_threshold,
            dynamic_range_max: params.dynamic_range_max.unwrap_or(dynamic_range_max),
            bounds: params.roi_bounds(),
        }
    }
}

/// One plane's detection input: its mean image and the combined user mask, if any.
#[derive(Debug, Clone)]
pub struct DetectionInput {
    pub mean_image: Image,
    pub mask: Option<Mask>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectedPlane {
    pub label_map: LabelMap,
    pub areas: BTreeMap<u32, f32>,
    pub circularities: BTreeMap<u32, f32>,
    pub filtered_out: BTreeSet<u32>,
}

#[derive(Debug)]
pub struct RoiDetectionOutput {
    pub planes: Vec<DetectedPlane>,
    pub used_mc_video: bool,
}

pub struct RoiDetectionJob {
    inputs: Vec<DetectionInput>,
    settings: DetectionSettings,
    used_mc_video: bool,
    provider: Arc<dyn AlgorithmProvider>,
}

impl RoiDetectionJob {
    pub fn new(
        inputs: Vec<DetectionInput>,
        settings: DetectionSettings,
        used_mc_video: bool,
        provider: Arc<dyn AlgorithmProvider>,
    ) -> Self {
        Self {
            inputs,
            settings,
            used_mc_video,
            provider,
        }
    }
}

/// Clears the segmentation outside the user mask, in both the mask and the intermediate image.
fn restrict(segmentation: &mut Segmentation, allowed: &Mask) {
    Zip::from(&mut segmentation.mask)
        .and(&mut segmentation.intermediate)
        .and(allowed)
        .for_each(|inside, value, allowed| {
            if !*allowed {
                *inside = false;
                *value = 0.0;
            }
        });
}

impl Job for RoiDetectionJob {
    fn kind(&self) -> JobKind {
        JobKind::RoiDetection
    }

    fn run(self: Box<Self>, ctx: &JobContext) -> Result<JobOutput> {
        let settings = self.settings;
        let total = self.inputs.len().max(1) as f32;
        let mut planes = Vec::with_capacity(self.inputs.len());

        for (z, input) in self.inputs.iter().enumerate() {
            let z = z as f32;
            ctx.checkpoint()?;
            if let Some(mask) = &input.mask {
                if mask.dim() != input.mean_image.dim() {
                    return Err(AlgorithmError::ShapeMismatch {
                        expected: input.mean_image.dim(),
                        found: mask.dim(),
                    }
                    .into());
                }
            }
            let adjusted =
                self.provider
                    .adjust_image(&input.mean_image, settings.contrast, settings.gamma);
            let background = self.provider.background_mask(
                &adjusted,
                settings.background_threshold,
                settings.dynamic_range_max,
            );
            ctx.report((z + 1.0 / 3.0) / total);

            ctx.checkpoint()?;
            let equalized = self.provider.equalize(
                &adjusted,
                &background,
                settings.window_size,
                settings.dynamic_range_max,
            )?;
            let mut segmentation = self.provider.segment(&equalized, settings.soma_threshold)?;
            if let Some(allowed) = &input.mask {
                restrict(&mut segmentation, allowed);
            }
            ctx.report((z + 2.0 / 3.0) / total);

            ctx.checkpoint()?;
            let mut extracted = self.provider.extract_rois(
                &segmentation.mask,
                &segmentation.intermediate,
                &input.mean_image,
            )?;
            if let Some(allowed) = &input.mask {
                Zip::from(&mut extracted.label_map)
                    .and(allowed)
                    .for_each(|label, allowed| {
                        if !*allowed {
                            *label = 0;
                        }
                    });
            }
            let filter = self.provider.filter_rois(
                &input.mean_image,
                &extracted.label_map,
                &settings.bounds,
                &extracted.areas,
                &extracted.circularities,
            );
            planes.push(DetectedPlane {
                label_map: extracted.label_map,
                areas: extracted.areas,
                circularities: extracted.circularities,
                filtered_out: filter.filtered_out,
            });
            ctx.report((z + 1.0) / total);
        }
        ctx.checkpoint()?;

        Ok(JobOutput::RoiDetection(RoiDetectionOutput {
            planes,
            used_mc_video: self.used_mc_video,
        }))
    }
}
