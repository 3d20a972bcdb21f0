use image::{Rgb, RgbImage};
use ndarray::Array3;

use crate::algorithms::Image;
use crate::model::{LabelMap, RoiSets};

const GOLDEN_RATIO_CONJUGATE: f32 = 0.618_034;
const ROI_ALPHA: f32 = 0.45;
const LOCKED_ALPHA: f32 = 0.75;
const SELECTED_COLOR: [u8; 3] = [255, 255, 255];

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [u8; 3] {
    let sector = hue * 6.0;
    let chroma = value * saturation;
    let secondary = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, secondary, 0.0),
        1 => (secondary, chroma, 0.0),
        2 => (0.0, chroma, secondary),
        3 => (0.0, secondary, chroma),
        4 => (secondary, 0.0, chroma),
        _ => (chroma, 0.0, secondary),
    };
    let offset = value - chroma;
    [r, g, b].map(|channel| ((channel + offset) * 255.0).round().clamp(0.0, 255.0) as u8)
}

/// Stable, well-spread colour for a label; background is black.
pub fn label_color(label: u32) -> [u8; 3] {
    if label == 0 {
        return [0, 0, 0];
    }
    let hue = (label as f32 * GOLDEN_RATIO_CONJUGATE).fract();
    hsv_to_rgb(hue, 0.85, 1.0)
}

/// rows × cols × 3 colour buffer for every label in the map.
pub fn overlay(labels: &LabelMap) -> Array3<u8> {
    let (height, width) = labels.dim();
    Array3::from_shape_fn((height, width, 3), |(y, x, channel)| {
        label_color(labels[(y, x)])[channel]
    })
}

fn blend(base: u8, color: u8, alpha: f32) -> u8 {
    (f32::from(base) * (1.0 - alpha) + f32::from(color) * alpha).round() as u8
}

/// Composites the adjusted image with the overlay. Removed labels are hidden, locked labels
/// are drawn more opaque and the selection is highlighted.
pub fn render(
    adjusted: &Image,
    overlay: &Array3<u8>,
    labels: &LabelMap,
    sets: &RoiSets,
    selection: Option<u32>,
) -> RgbImage {
    let (height, width) = labels.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (row, column) = (y as usize, x as usize);
        let gray = adjusted
            .get((row, column))
            .map_or(0, |value| value.round().clamp(0.0, 255.0) as u8);
        let label = labels[(row, column)];
        if label == 0 || sets.is_removed(label) {
            return Rgb([gray; 3]);
        }
        let (color, alpha) = if selection == Some(label) {
            (SELECTED_COLOR, ROI_ALPHA)
        } else {
            let color = [0, 1, 2].map(|channel| overlay[(row, column, channel)]);
            let alpha = if sets.is_locked(label) {
                LOCKED_ALPHA
            } else {
                ROI_ALPHA
            };
            (color, alpha)
        };
        Rgb([0, 1, 2].map(|channel| blend(gray, color[channel], alpha)))
    })
}
