use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use ndarray::Axis;

use crate::algorithms::{AlgorithmProvider, Image};
use crate::formats::{
    FormatError, PlaneOutputs, VideoReader, output_dir_for, write_centroids_csv, write_label_map,
    write_traces_csv, write_video,
};
use crate::model::{CoreError, LabelMap, MotionCorrectionParams, Video, shift_label_map};

use super::{Job, JobContext, JobError, JobKind, JobOutput, Result};

/// Offsets at or beyond this many pixels in either axis are treated as misalignment.
pub const MAX_ALIGNMENT_SHIFT: i32 = 20;

/// Settings captured when the batch is queued; later edits to the session do not apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSettings {
    pub motion_correct: bool,
    pub apply_blur: bool,
    pub motion_correction: MotionCorrectionParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedVideo {
    pub path: PathBuf,
    pub output_dir: PathBuf,
    /// Accepted (dy, dx) per plane, `None` where alignment was rejected.
    pub shifts: Vec<Option<(i32, i32)>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub processed: Vec<ProcessedVideo>,
    pub skipped: Vec<PathBuf>,
}

pub struct BatchProcessingJob {
    paths: Vec<PathBuf>,
    label_maps: Vec<LabelMap>,
    settings: BatchSettings,
    reader: Arc<dyn VideoReader>,
    provider: Arc<dyn AlgorithmProvider>,
}

impl BatchProcessingJob {
    /// `label_maps` holds one map per plane with removed ROIs already cleared.
    pub fn new(
        paths: Vec<PathBuf>,
        label_maps: Vec<LabelMap>,
        settings: BatchSettings,
        reader: Arc<dyn VideoReader>,
        provider: Arc<dyn AlgorithmProvider>,
    ) -> Self {
        Self {
            paths,
            label_maps,
            settings,
            reader,
            provider,
        }
    }

    fn load(&self, path: &Path) -> Result<Option<Video>> {
        match self.reader.read(path) {
            Ok(video) => Ok(Some(video)),
            Err(FormatError::Core(CoreError::NotEnoughDimensions { ndim })) => {
                warn!("skipping {}: {ndim}-D data is not a video", path.display());
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn motion_correct(
        &self,
        video: &Video,
        ctx: &JobContext,
        progress: &dyn Fn(f32),
    ) -> Result<Video> {
        let mut data = video.data().clone();
        let planes = video.planes() as f32;
        for z in 0..video.planes() {
            ctx.checkpoint()?;
            let corrected = self.provider.motion_correct(
                video.plane(z),
                &self.settings.motion_correction,
                &mut |fraction| progress((z as f32 + fraction) / planes),
                ctx.token(),
            )?;
            if corrected.dim() != video.plane(z).dim() {
                return Err(JobError::DegenerateResult(format!(
                    "plane {z} came back as {:?}",
                    corrected.dim()
                )));
            }
            data.index_axis_mut(Axis(1), z).assign(&corrected);
        }
        let mut corrected = Video::new(data)?;
        if corrected.is_degenerate() {
            return Err(JobError::DegenerateResult(
                "motion correction produced an all-zero video".into(),
            ));
        }
        if let Some(source) = video.source() {
            corrected = corrected.with_source(source);
        }
        Ok(corrected)
    }

    fn mean_images(&self, video: &Video) -> Vec<Image> {
        video
            .mean_images()
            .into_iter()
            .map(|mean| {
                if self.settings.apply_blur {
                    self.provider.smooth(&mean)
                } else {
                    mean
                }
            })
            .collect()
    }

    fn align(&self, reference: &Image, mean: &Image, z: usize) -> Result<Option<(i32, i32)>> {
        let (dy, dx) = self.provider.estimate_shift(reference, mean)?;
        if dy.abs() >= MAX_ALIGNMENT_SHIFT || dx.abs() >= MAX_ALIGNMENT_SHIFT {
            warn!("plane {z}: rejecting alignment shift ({dy}, {dx})");
            return Ok(None);
        }
        Ok(Some((dy, dx)))
    }
}

impl Job for BatchProcessingJob {
    fn kind(&self) -> JobKind {
        JobKind::BatchProcessing
    }

    fn run(self: Box<Self>, ctx: &JobContext) -> Result<JobOutput> {
        let total = self.paths.len().max(1) as f32;
        let mut summary = BatchSummary::default();
        let mut reference: Option<Vec<Image>> = None;

        for (index, path) in self.paths.iter().enumerate() {
            let unit = index as f32;
            let phase = |fraction: f32| ctx.report((unit + fraction) / total);
            ctx.checkpoint()?;

            let Some(mut video) = self.load(path)? else {
                summary.skipped.push(path.clone());
                phase(1.0);
                continue;
            };
            let bucket = video.dynamic_range();
            video.clip_to(bucket);
            let output_dir = output_dir_for(path);
            fs::create_dir_all(&output_dir).map_err(FormatError::from)?;
            phase(0.25);

            if self.settings.motion_correct {
                video = self.motion_correct(&video, ctx, &|fraction| phase(0.25 + 0.25 * fraction))?;
                let stem = output_dir
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| "video".into());
                write_video(output_dir.join(format!("{stem}_mc.tif")), &video)?;
            }
            phase(0.5);
            ctx.checkpoint()?;

            let means = self.mean_images(&video);
            let reference = reference.get_or_insert_with(|| means.clone());
            let planes = video.planes().min(self.label_maps.len());
            let mut shifts = Vec::with_capacity(planes);

            for z in 0..planes {
                ctx.checkpoint()?;
                let shift = match reference.get(z) {
                    Some(reference) => self.align(reference, &means[z], z)?,
                    None => {
                        warn!("plane {z}: no reference mean image to align against");
                        None
                    }
                };
                let labels = match shift {
                    Some((dy, dx)) => shift_label_map(&self.label_maps[z], dy, dx),
                    None => self.label_maps[z].clone(),
                };
                let traces = self.provider.centroids_and_traces(&labels, video.plane(z))?;

                let outputs = PlaneOutputs::new(&output_dir, z);
                write_label_map(&outputs.rois, &labels)?;
                write_traces_csv(&outputs.traces, &traces)?;
                write_centroids_csv(&outputs.centroids, &traces)?;
                shifts.push(shift);
                phase(0.5 + 0.5 * (z + 1) as f32 / planes as f32);
            }

            info!(
                "processed {} into {}",
                path.display(),
                output_dir.display()
            );
            summary.processed.push(ProcessedVideo {
                path: path.clone(),
                output_dir,
                shifts,
            });
            phase(1.0);
        }

        Ok(JobOutput::Batch(summary))
    }
}
