use std::sync::Arc;

use ndarray::Axis;

use crate::algorithms::AlgorithmProvider;
use crate::model::{MotionCorrectionParams, Video};

use super::{Job, JobContext, JobError, JobKind, JobOutput, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSelection {
    All,
    Single(usize),
}

impl PlaneSelection {
    fn planes(self, count: usize) -> Result<Vec<usize>> {
        match self {
            PlaneSelection::All => Ok((0..count).collect()),
            PlaneSelection::Single(z) if z < count => Ok(vec![z]),
            PlaneSelection::Single(z) => Err(JobError::PlaneOutOfRange { z, planes: count }),
        }
    }
}

#[derive(Debug)]
pub struct MotionCorrectionOutput {
    /// Full-size replacement; planes outside `selection` are copied unchanged.
    pub video: Video,
    pub selection: PlaneSelection,
}

pub struct MotionCorrectionJob {
    video: Arc<Video>,
    selection: PlaneSelection,
    params: MotionCorrectionParams,
    provider: Arc<dyn AlgorithmProvider>,
}

impl MotionCorrectionJob {
    pub fn new(
        video: Arc<Video>,
        selection: PlaneSelection,
        params: MotionCorrectionParams,
        provider: Arc<dyn AlgorithmProvider>,
    ) -> Self {
        Self {
            video,
            selection,
            params,
            provider,
        }
    }
}

impl Job for MotionCorrectionJob {
    fn kind(&self) -> JobKind {
        JobKind::MotionCorrection
    }

    fn run(self: Box<Self>, ctx: &JobContext) -> Result<JobOutput> {
        let planes = self.selection.planes(self.video.planes())?;
        let total = planes.len() as f32;
        let mut data = self.video.data().clone();
        let mut has_signal = false;

        for (done, z) in planes.iter().copied().enumerate() {
            ctx.checkpoint()?;
            let corrected = self.provider.motion_correct(
                self.video.plane(z),
                &self.params,
                &mut |fraction| ctx.report((done as f32 + fraction) / total),
                ctx.token(),
            )?;
            if corrected.dim() != self.video.plane(z).dim() {
                return Err(JobError::DegenerateResult(format!(
                    "plane {z} came back as {:?}",
                    corrected.dim()
                )));
            }
            has_signal |= corrected.iter().any(|value| *value != 0.0);
            data.index_axis_mut(Axis(1), z).assign(&corrected);
            ctx.report((done + 1) as f32 / total);
        }
        ctx.checkpoint()?;

        if !has_signal {
            return Err(JobError::DegenerateResult(
                "motion correction produced an all-zero video".into(),
            ));
        }
        let mut video = Video::new(data)?;
        if let Some(source) = self.video.source() {
            video = video.with_source(source);
        }
        Ok(JobOutput::MotionCorrection(MotionCorrectionOutput {
            video,
            selection: self.selection,
        }))
    }
}
