use std::f32::consts::PI;

use ndarray::{Axis, Zip};

use super::Image;

pub(crate) fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = (sigma * 3.0).ceil().max(1.0) as i32;
    let norm = sigma * (2.0 * PI).sqrt();
    let mut kernel = (-radius..=radius)
        .map(|offset| {
            let distance = offset as f32;
            (-(distance * distance) / (2.0 * sigma * sigma)).exp() / norm
        })
        .collect::<Vec<_>>();
    let sum = kernel.iter().sum::<f32>().max(f32::EPSILON);
    kernel.iter_mut().for_each(|value| *value /= sum);
    kernel
}

/// Separable Gaussian blur with edge clamping.
pub fn gaussian_blur(image: &Image, sigma: f32) -> Image {
    if sigma <= f32::EPSILON {
        return image.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let mut current = image.clone();
    for axis in [Axis(0), Axis(1)] {
        if current.len_of(axis) <= 1 {
            continue;
        }
        let source = current.clone();
        Zip::from(current.lanes_mut(axis))
            .and(source.lanes(axis))
            .par_for_each(|mut output, input| {
                let radius = (kernel.len() / 2) as isize;
                let last = input.len() as isize - 1;
                for (coord, value) in output.iter_mut().enumerate() {
                    *value = kernel
                        .iter()
                        .enumerate()
                        .map(|(index, weight)| {
                            let candidate = coord as isize + index as isize - radius;
                            input[candidate.clamp(0, last) as usize] * weight
                        })
                        .sum();
                }
            });
    }
    current
}

/// Minimum and maximum over a square window centred on each pixel.
pub fn local_extrema(image: &Image, window_size: usize) -> (Image, Image) {
    let radius = (window_size / 2) as isize;
    let (height, width) = image.dim();
    let extrema = Zip::indexed(image).par_map_collect(|(y, x), _| {
        let mut low = f32::INFINITY;
        let mut high = f32::NEG_INFINITY;
        for dy in -radius..=radius {
            let row = y as isize + dy;
            if row < 0 || row >= height as isize {
                continue;
            }
            for dx in -radius..=radius {
                let column = x as isize + dx;
                if column < 0 || column >= width as isize {
                    continue;
                }
                let value = image[(row as usize, column as usize)];
                low = low.min(value);
                high = high.max(value);
            }
        }
        (low, high)
    });
    (extrema.mapv(|pair| pair.0), extrema.mapv(|pair| pair.1))
}
