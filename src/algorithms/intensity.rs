use ndarray::Zip;

use super::filters::local_extrema;
use super::{Image, Mask};

const DISPLAY_MAX: f32 = 255.0;

fn max_value(image: &Image) -> f32 {
    image.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

/// Brings an image into the 8-bit display range: negative offsets are removed, unit-range
/// images are stretched and anything above 255 is scaled down.
pub fn to_display_range(image: &Image) -> Image {
    let min = image.iter().copied().fold(f32::INFINITY, f32::min);
    let shifted = if min < 0.0 {
        image.mapv(|value| value - min)
    } else {
        image.clone()
    };
    let max = max_value(&shifted);
    if max <= 1.0 {
        shifted.mapv(|value| value * DISPLAY_MAX)
    } else if max <= DISPLAY_MAX {
        shifted
    } else {
        shifted.mapv(|value| value * DISPLAY_MAX / max)
    }
}

pub fn adjust_contrast(value: f32, contrast: f32) -> f32 {
    (contrast * value).min(DISPLAY_MAX)
}

pub fn adjust_gamma(value: f32, gamma: f32) -> f32 {
    (DISPLAY_MAX * (value / DISPLAY_MAX).max(0.0).powf(1.0 / gamma)).min(DISPLAY_MAX)
}

pub fn adjust_image(mean_image: &Image, contrast: f32, gamma: f32) -> Image {
    let mut adjusted = to_display_range(mean_image);
    adjusted.par_mapv_inplace(|value| adjust_gamma(adjust_contrast(value, contrast), gamma));
    adjusted
}

/// Marks pixels dimmer than `threshold` (display units) as background.
pub fn background_mask(image: &Image, threshold: f32, dynamic_range_max: f32) -> Mask {
    let scale = if max_value(image) > DISPLAY_MAX {
        DISPLAY_MAX / dynamic_range_max.max(1.0)
    } else {
        1.0
    };
    image.mapv(|value| value * scale < threshold)
}

/// Local contrast stretch over a square window; background pixels are zeroed.
///
/// Windows spanning less than one raw intensity step (in display units) count as flat.
pub fn equalize(
    image: &Image,
    background: &Mask,
    window_size: usize,
    dynamic_range_max: f32,
) -> Image {
    let min_span = DISPLAY_MAX / dynamic_range_max.max(DISPLAY_MAX);
    let (low, high) = local_extrema(image, window_size.max(1));
    Zip::from(image)
        .and(background)
        .and(&low)
        .and(&high)
        .par_map_collect(|value, is_background, low, high| {
            let span = high - low;
            if *is_background || span < min_span {
                0.0
            } else {
                (value - low) / span * DISPLAY_MAX
            }
        })
}
