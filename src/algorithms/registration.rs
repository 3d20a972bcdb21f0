use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

use crate::jobs::CancellationToken;
use crate::model::MotionCorrectionParams;

use super::error::ensure_same_shape;
use super::{AlgorithmError, Image, Result};

type Spectrum = Array2<Complex<f32>>;

fn fft_axis(buffer: &mut Spectrum, planner: &mut FftPlanner<f32>, axis: Axis, inverse: bool) {
    let length = buffer.len_of(axis);
    let fft = if inverse {
        planner.plan_fft_inverse(length)
    } else {
        planner.plan_fft_forward(length)
    };
    let mut scratch = vec![Complex::default(); length];
    for mut lane in buffer.lanes_mut(axis) {
        scratch
            .iter_mut()
            .zip(lane.iter())
            .for_each(|(slot, value)| *slot = *value);
        fft.process(&mut scratch);
        lane.iter_mut()
            .zip(scratch.iter())
            .for_each(|(slot, value)| *slot = *value);
    }
}

fn fft2(buffer: &mut Spectrum, planner: &mut FftPlanner<f32>, inverse: bool) {
    fft_axis(buffer, planner, Axis(1), inverse);
    fft_axis(buffer, planner, Axis(0), inverse);
}

/// Forward spectrum of a mean-subtracted image.
fn spectrum(image: ArrayView2<'_, f32>, planner: &mut FftPlanner<f32>) -> Spectrum {
    let mean = image.mean().unwrap_or(0.0);
    let mut buffer = image.mapv(|value| Complex::new(value - mean, 0.0));
    fft2(&mut buffer, planner, false);
    buffer
}

/// Peak of the normalized cross-power spectrum, as the signed displacement of `moving`.
fn correlation_peak(
    reference: &Spectrum,
    moving: &Spectrum,
    planner: &mut FftPlanner<f32>,
) -> (i32, i32) {
    let mut cross = Zip::from(moving)
        .and(reference)
        .map_collect(|moving, reference| {
            let product = moving * reference.conj();
            let magnitude = product.norm();
            if magnitude <= f32::EPSILON {
                Complex::default()
            } else {
                product / magnitude
            }
        });
    fft2(&mut cross, planner, true);

    let (height, width) = cross.dim();
    let mut peak = ((0usize, 0usize), f32::NEG_INFINITY);
    for (index, value) in cross.indexed_iter() {
        if value.re > peak.1 {
            peak = (index, value.re);
        }
    }
    let ((row, column), _) = peak;
    let wrap = |offset: usize, size: usize| {
        if offset > size / 2 {
            offset as i32 - size as i32
        } else {
            offset as i32
        }
    };
    (wrap(row, height), wrap(column, width))
}

/// Phase-correlation estimate of how far `moving` is displaced relative to `reference`:
/// `moving[y, x] ≈ reference[y - dy, x - dx]`.
pub fn estimate_shift(reference: &Image, moving: &Image) -> Result<(i32, i32)> {
    ensure_same_shape(reference.dim(), moving.dim())?;
    if reference.is_empty() {
        return Err(AlgorithmError::EmptyInput("shift estimation image".into()));
    }
    let mut planner = FftPlanner::new();
    let reference = spectrum(reference.view(), &mut planner);
    let moving = spectrum(moving.view(), &mut planner);
    Ok(correlation_peak(&reference, &moving, &mut planner))
}

/// Moves content by (dy, dx): `out[y, x] = frame[y - dy, x - dx]`, zero-filled.
pub fn translate(frame: ArrayView2<'_, f32>, dy: i32, dx: i32) -> Image {
    let (height, width) = frame.dim();
    Image::from_shape_fn((height, width), |(y, x)| {
        let source_y = y as i64 - i64::from(dy);
        let source_x = x as i64 - i64::from(dx);
        if source_y < 0 || source_x < 0 || source_y >= height as i64 || source_x >= width as i64 {
            0.0
        } else {
            frame[(source_y as usize, source_x as usize)]
        }
    })
}

/// Rigid per-frame registration of one plane against its temporal mean.
///
/// Shifts are clamped to `max_shift` in each axis. The token is polled before every frame.
pub fn motion_correct_frames(
    frames: ArrayView3<'_, f32>,
    params: &MotionCorrectionParams,
    progress: &mut dyn FnMut(f32),
    cancel: &CancellationToken,
) -> Result<Array3<f32>> {
    let (count, height, width) = frames.dim();
    if count == 0 || height == 0 || width == 0 {
        return Err(AlgorithmError::EmptyInput("motion correction frames".into()));
    }
    let template = frames
        .mean_axis(Axis(0))
        .ok_or_else(|| AlgorithmError::EmptyInput("motion correction template".into()))?;
    let limit = params.max_shift as i32;
    let mut planner = FftPlanner::new();
    let reference = spectrum(template.view(), &mut planner);
    let mut corrected = Array3::<f32>::zeros((count, height, width));

    for (index, frame) in frames.axis_iter(Axis(0)).enumerate() {
        if cancel.is_cancelled() {
            return Err(AlgorithmError::Cancelled);
        }
        let moving = spectrum(frame, &mut planner);
        let (dy, dx) = correlation_peak(&reference, &moving, &mut planner);
        let (dy, dx) = (dy.clamp(-limit, limit), dx.clamp(-limit, limit));
        corrected
            .index_axis_mut(Axis(0), index)
            .assign(&translate(frame, -dy, -dx));
        progress((index + 1) as f32 / count as f32);
    }

    Ok(corrected)
}
