use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::f32::consts::PI;

use crate::model::{LabelMap, RoiBounds, label_set, pixel_count};

use super::{ExtractedRois, Image, Mask, RoiFilterResult, Segmentation};

const NEIGHBOURS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Otsu's between-class variance threshold over a 256-bin histogram.
pub fn otsu_threshold(image: &Image) -> f32 {
    let (min, max) = image
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), value| {
            (lo.min(*value), hi.max(*value))
        });
    if !min.is_finite() || !max.is_finite() {
        return 0.0;
    }
    let span = (max - min).max(f32::EPSILON);
    let mut histogram = [0_u64; 256];
    for value in image {
        let bin = (((*value - min) / span).clamp(0.0, 1.0) * 255.0).round() as usize;
        histogram[bin] += 1;
    }

    let total = image.len() as f64;
    let weighted_total = histogram
        .iter()
        .enumerate()
        .map(|(bin, count)| bin as f64 * *count as f64)
        .sum::<f64>();

    let mut background_weight = 0.0_f64;
    let mut background_sum = 0.0_f64;
    let mut best = (-1.0_f64, 0usize);
    for (bin, count) in histogram.iter().enumerate() {
        background_weight += *count as f64;
        if background_weight == 0.0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0.0 {
            break;
        }
        background_sum += bin as f64 * *count as f64;
        let background_mean = background_sum / background_weight;
        let foreground_mean = (weighted_total - background_sum) / foreground_weight;
        let variance =
            background_weight * foreground_weight * (background_mean - foreground_mean).powi(2);
        if variance > best.0 {
            best = (variance, bin);
        }
    }
    (best.1 as f32 / 255.0) * span + min
}

/// Foreground is everything brighter than `threshold` times the Otsu level.
pub fn segment(image: &Image, threshold: f32) -> Segmentation {
    let level = otsu_threshold(image) * threshold;
    let mask = image.mapv(|value| value > 0.0 && value > level);
    let mut intermediate = image.clone();
    intermediate.zip_mut_with(&mask, |value, inside| {
        if !*inside {
            *value = 0.0;
        }
    });
    Segmentation { mask, intermediate }
}

/// Labels 4-connected foreground components in raster order and measures each one.
///
/// Circularity is `4πA / P²` where the perimeter counts exposed pixel edges.
pub fn extract_rois(mask: &Mask) -> ExtractedRois {
    let (height, width) = mask.dim();
    let mut label_map = LabelMap::zeros((height, width));
    let mut areas = BTreeMap::new();
    let mut circularities = BTreeMap::new();
    let mut next_label = 1_u32;

    for ((y, x), inside) in mask.indexed_iter() {
        if !*inside || label_map[(y, x)] != 0 {
            continue;
        }
        let mut queue = VecDeque::from([(y, x)]);
        label_map[(y, x)] = next_label;
        let mut area = 0usize;
        let mut perimeter = 0usize;

        while let Some((row, column)) = queue.pop_front() {
            area += 1;
            for (dy, dx) in NEIGHBOURS {
                let next_row = row as isize + dy;
                let next_column = column as isize + dx;
                if next_row < 0
                    || next_column < 0
                    || next_row >= height as isize
                    || next_column >= width as isize
                {
                    perimeter += 1;
                    continue;
                }
                let candidate = (next_row as usize, next_column as usize);
                if !mask[candidate] {
                    perimeter += 1;
                    continue;
                }
                if label_map[candidate] == 0 {
                    label_map[candidate] = next_label;
                    queue.push_back(candidate);
                }
            }
        }

        let area = area as f32;
        let perimeter = perimeter.max(1) as f32;
        areas.insert(next_label, area);
        circularities.insert(next_label, 4.0 * PI * area / (perimeter * perimeter));
        next_label += 1;
    }

    ExtractedRois {
        label_map,
        areas,
        circularities,
    }
}

/// Splits the labels present in the map into those inside `bounds` and those outside.
///
/// Labels without a recorded area fall back to their pixel count; missing circularities
/// count as 0.
pub fn filter_rois(
    label_map: &LabelMap,
    bounds: &RoiBounds,
    areas: &BTreeMap<u32, f32>,
    circularities: &BTreeMap<u32, f32>,
) -> RoiFilterResult {
    let mut kept = BTreeSet::new();
    let mut filtered_out = BTreeSet::new();
    for label in label_set(label_map) {
        let area = areas
            .get(&label)
            .copied()
            .unwrap_or_else(|| pixel_count(label_map, label) as f32);
        let circularity = circularities.get(&label).copied().unwrap_or(0.0);
        if bounds.contains(area, circularity) {
            kept.insert(label);
        } else {
            filtered_out.insert(label);
        }
    }
    RoiFilterResult { kept, filtered_out }
}

/// Area and circularity of one label, or `None` when the label has no pixels.
pub fn measure_label(label_map: &LabelMap, label: u32) -> Option<(f32, f32)> {
    let (height, width) = label_map.dim();
    let mut area = 0usize;
    let mut perimeter = 0usize;
    for ((y, x), value) in label_map.indexed_iter() {
        if *value != label {
            continue;
        }
        area += 1;
        for (dy, dx) in NEIGHBOURS {
            let row = y as isize + dy;
            let column = x as isize + dx;
            let outside = row < 0
                || column < 0
                || row >= height as isize
                || column >= width as isize
                || label_map[(row as usize, column as usize)] != label;
            if outside {
                perimeter += 1;
            }
        }
    }
    if area == 0 {
        return None;
    }
    let area = area as f32;
    let perimeter = perimeter as f32;
    Some((area, 4.0 * PI * area / (perimeter * perimeter)))
}

/// Area and circularity of every positive label in a single pass.
pub fn measure_labels(label_map: &LabelMap) -> (BTreeMap<u32, f32>, BTreeMap<u32, f32>) {
    let (height, width) = label_map.dim();
    let mut counts = BTreeMap::<u32, (usize, usize)>::new();
    for ((y, x), label) in label_map.indexed_iter() {
        if *label == 0 {
            continue;
        }
        let exposed = NEIGHBOURS
            .iter()
            .filter(|(dy, dx)| {
                let row = y as isize + dy;
                let column = x as isize + dx;
                row < 0
                    || column < 0
                    || row >= height as isize
                    || column >= width as isize
                    || label_map[(row as usize, column as usize)] != *label
            })
            .count();
        let entry = counts.entry(*label).or_default();
        entry.0 += 1;
        entry.1 += exposed;
    }

    let mut areas = BTreeMap::new();
    let mut circularities = BTreeMap::new();
    for (label, (area, perimeter)) in counts {
        let area = area as f32;
        let perimeter = perimeter.max(1) as f32;
        areas.insert(label, area);
        circularities.insert(label, 4.0 * PI * area / (perimeter * perimeter));
    }
    (areas, circularities)
}
