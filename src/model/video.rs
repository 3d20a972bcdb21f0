use std::path::{Path, PathBuf};

use ndarray::{Array2, Array4, ArrayD, ArrayView2, ArrayView3, Axis, Ix4};
use rayon::prelude::*;

use super::{CoreError, Result};

/// Discrete dynamic-range maxima a video is clipped to.
pub const DYNAMIC_RANGE_BUCKETS: [f32; 6] = [1.0, 255.0, 511.0, 1023.0, 2047.0, 4095.0];

/// Returns the smallest bucket that the observed maximum does not exceed.
///
/// Values above the largest bucket still map to 4095.
pub fn dynamic_range_bucket(max_value: f32) -> f32 {
    DYNAMIC_RANGE_BUCKETS
        .iter()
        .copied()
        .find(|bucket| max_value <= *bucket)
        .unwrap_or(DYNAMIC_RANGE_BUCKETS[DYNAMIC_RANGE_BUCKETS.len() - 1])
}

/// A time-lapse recording laid out as (time, plane, row, column).
#[derive(Debug, Clone)]
pub struct Video {
    data: Array4<f32>,
    source: Option<PathBuf>,
}

impl Video {
    pub fn new(mut data: Array4<f32>) -> Result<Self> {
        for (axis, size) in data.shape().iter().enumerate() {
            if *size == 0 {
                return Err(CoreError::ZeroSizedDimension { axis });
            }
        }
        data.par_mapv_inplace(|value| if value.is_nan() { 0.0 } else { value });
        Ok(Self { data, source: None })
    }

    /// Builds a video from an arbitrary-rank buffer, promoting (t, y, x) to a single plane.
    pub fn from_dyn(data: ArrayD<f32>) -> Result<Self> {
        let ndim = data.ndim();
        let data = match ndim {
            0..=2 => return Err(CoreError::NotEnoughDimensions { ndim }),
            3 => data.insert_axis(Axis(1)),
            4 => data,
            _ => return Err(CoreError::TooManyDimensions { ndim }),
        };
        let data = data
            .into_dimensionality::<Ix4>()
            .map_err(|_| CoreError::TooManyDimensions { ndim })?;
        Self::new(data)
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn frames(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn planes(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn frame_shape(&self) -> (usize, usize) {
        (self.data.shape()[2], self.data.shape()[3])
    }

    /// All frames of one plane as (time, row, column).
    pub fn plane(&self, z: usize) -> ArrayView3<'_, f32> {
        self.data.index_axis(Axis(1), z)
    }

    pub fn frame(&self, t: usize, z: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), t).index_axis_move(Axis(0), z)
    }

    pub fn mean_image(&self, z: usize) -> Array2<f32> {
        let (height, width) = self.frame_shape();
        self.plane(z)
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array2::zeros((height, width)))
    }

    pub fn mean_images(&self) -> Vec<Array2<f32>> {
        (0..self.planes()).map(|z| self.mean_image(z)).collect()
    }

    pub fn max_value(&self) -> f32 {
        self.data
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn dynamic_range(&self) -> f32 {
        dynamic_range_bucket(self.max_value())
    }

    /// Clamps every sample into `[0, max]`.
    pub fn clip_to(&mut self, max: f32) {
        self.data.par_mapv_inplace(|value| value.clamp(0.0, max));
    }

    /// A buffer with no signal at all, as returned by a failed motion correction.
    pub fn is_degenerate(&self) -> bool {
        self.data.iter().all(|value| *value == 0.0)
    }
}
