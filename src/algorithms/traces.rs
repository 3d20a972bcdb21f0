use ndarray::{Array1, Array2, ArrayView3, Axis};
use rayon::prelude::*;

use crate::model::{LabelMap, label_set};

use super::error::ensure_same_shape;
use super::{Result, RoiTraces};

struct RoiPixels {
    label: u32,
    pixels: Vec<(usize, usize)>,
}

fn collect_pixels(labels: &LabelMap) -> Vec<RoiPixels> {
    let mut rois = label_set(labels)
        .into_iter()
        .map(|label| RoiPixels {
            label,
            pixels: Vec::new(),
        })
        .collect::<Vec<_>>();
    for ((y, x), label) in labels.indexed_iter() {
        if *label == 0 {
            continue;
        }
        if let Ok(index) = rois.binary_search_by_key(label, |roi| roi.label) {
            rois[index].pixels.push((y, x));
        }
    }
    rois
}

/// Per-ROI centroid `(x, y)` and mean intensity over time for every positive label.
///
/// `frames` is one plane laid out as (time, row, column). Traces are (time, roi) with columns
/// ordered like `labels`.
pub fn centroids_and_traces(labels: &LabelMap, frames: ArrayView3<'_, f32>) -> Result<RoiTraces> {
    let (count, height, width) = frames.dim();
    ensure_same_shape(labels.dim(), (height, width))?;
    let rois = collect_pixels(labels);

    let mut centroids = Array2::<f32>::zeros((rois.len(), 2));
    for (row, roi) in rois.iter().enumerate() {
        let n = roi.pixels.len() as f32;
        let (sum_y, sum_x) = roi
            .pixels
            .iter()
            .fold((0.0_f32, 0.0_f32), |(sy, sx), (y, x)| {
                (sy + *y as f32, sx + *x as f32)
            });
        centroids[(row, 0)] = sum_x / n;
        centroids[(row, 1)] = sum_y / n;
    }

    let rows = (0..count)
        .into_par_iter()
        .map(|t| {
            let frame = frames.index_axis(Axis(0), t);
            rois.iter()
                .map(|roi| {
                    let total = roi.pixels.iter().map(|pixel| frame[*pixel]).sum::<f32>();
                    total / roi.pixels.len() as f32
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut traces = Array2::<f32>::zeros((count, rois.len()));
    for (t, values) in rows.into_iter().enumerate() {
        for (column, value) in values.into_iter().enumerate() {
            traces[(t, column)] = value;
        }
    }

    Ok(RoiTraces {
        labels: rois.into_iter().map(|roi| roi.label).collect(),
        centroids,
        traces,
    })
}

/// Mean intensity of one label in every frame; empty when the label has no pixels.
pub fn roi_activity(labels: &LabelMap, frames: ArrayView3<'_, f32>, label: u32) -> Result<Array1<f32>> {
    let (count, height, width) = frames.dim();
    ensure_same_shape(labels.dim(), (height, width))?;
    let pixels = labels
        .indexed_iter()
        .filter(|(_, value)| **value == label && label > 0)
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    if pixels.is_empty() {
        return Ok(Array1::zeros(0));
    }
    let values = (0..count)
        .into_par_iter()
        .map(|t| {
            let frame = frames.index_axis(Axis(0), t);
            pixels.iter().map(|pixel| frame[*pixel]).sum::<f32>() / pixels.len() as f32
        })
        .collect::<Vec<_>>();
    Ok(Array1::from_vec(values))
}
