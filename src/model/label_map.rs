use std::collections::BTreeSet;

use ndarray::{Array2, Zip};

/// Per-plane ROI identities; 0 is background.
pub type LabelMap = Array2<u32>;

/// Pixel coordinate as (row, column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub y: usize,
    pub x: usize,
}

impl Point {
    pub fn new(y: usize, x: usize) -> Self {
        Self { y, x }
    }
}

pub fn max_label(labels: &LabelMap) -> u32 {
    labels.iter().copied().max().unwrap_or(0)
}

/// Distinct positive labels present in the map.
pub fn label_set(labels: &LabelMap) -> BTreeSet<u32> {
    labels.iter().copied().filter(|label| *label > 0).collect()
}

pub fn label_mask(labels: &LabelMap, label: u32) -> Array2<bool> {
    labels.mapv(|value| value == label)
}

pub fn pixel_count(labels: &LabelMap, label: u32) -> usize {
    labels.iter().filter(|value| **value == label).count()
}

pub fn label_at(labels: &LabelMap, point: Point) -> Option<u32> {
    labels
        .get((point.y, point.x))
        .copied()
        .filter(|label| *label > 0)
}

/// Copy of the map with every label in `removed` cleared to background.
pub fn without_labels(labels: &LabelMap, removed: &BTreeSet<u32>) -> LabelMap {
    labels.mapv(|value| if removed.contains(&value) { 0 } else { value })
}

/// Translates the map so that `out[y, x] = labels[y - dy, x - dx]`; pixels that would
/// come from outside the frame become background.
pub fn shift_label_map(labels: &LabelMap, dy: i32, dx: i32) -> LabelMap {
    let (height, width) = labels.dim();
    let mut shifted = LabelMap::zeros((height, width));
    for ((y, x), value) in shifted.indexed_iter_mut() {
        let source_y = y as i64 - i64::from(dy);
        let source_x = x as i64 - i64::from(dx);
        if source_y < 0 || source_x < 0 || source_y >= height as i64 || source_x >= width as i64 {
            continue;
        }
        *value = labels[(source_y as usize, source_x as usize)];
    }
    shifted
}

/// Paints `label` wherever `mask` is set, leaving pixels owned by `protected` labels untouched.
pub fn paint(labels: &mut LabelMap, mask: &Array2<bool>, label: u32, protected: &BTreeSet<u32>) {
    Zip::from(labels).and(mask).for_each(|value, inside| {
        if *inside && !protected.contains(value) {
            *value = label;
        }
    });
}
