use crate::model::Point;

use super::Mask;

#[derive(Debug, Clone, Copy)]
enum MorphologyKind {
    Erode,
    Dilate,
}

/// Offsets of a disk-shaped structuring element; radius 1 is the 4-neighbour cross.
pub fn disk_offsets(radius: usize) -> Vec<(isize, isize)> {
    let radius = radius as isize;
    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dy * dy + dx * dx <= radius * radius {
                offsets.push((dy, dx));
            }
        }
    }
    offsets
}

fn apply_morphology(mask: &Mask, radius: usize, kind: MorphologyKind) -> Mask {
    let offsets = disk_offsets(radius);
    let (height, width) = mask.dim();
    let mut output = mask.clone();

    for ((y, x), value) in output.indexed_iter_mut() {
        let mut aggregate = matches!(kind, MorphologyKind::Erode);
        for (dy, dx) in &offsets {
            let row = (y as isize + dy).clamp(0, height as isize - 1) as usize;
            let column = (x as isize + dx).clamp(0, width as isize - 1) as usize;
            let sample = mask[(row, column)];
            match kind {
                MorphologyKind::Erode => aggregate &= sample,
                MorphologyKind::Dilate => aggregate |= sample,
            }
        }
        *value = aggregate;
    }

    output
}

pub fn dilate(mask: &Mask, radius: usize) -> Mask {
    apply_morphology(mask, radius, MorphologyKind::Dilate)
}

pub fn erode(mask: &Mask, radius: usize) -> Mask {
    apply_morphology(mask, radius, MorphologyKind::Erode)
}

pub fn disk_mask(shape: (usize, usize), center: Point, radius: f32) -> Mask {
    let radius_sq = radius * radius;
    Mask::from_shape_fn(shape, |(y, x)| {
        let dy = y as f32 - center.y as f32;
        let dx = x as f32 - center.x as f32;
        dy * dy + dx * dx <= radius_sq
    })
}

/// Inclusive rectangle spanned by two corners in any order.
pub fn rect_mask(shape: (usize, usize), a: Point, b: Point) -> Mask {
    let (top, bottom) = (a.y.min(b.y), a.y.max(b.y));
    let (left, right) = (a.x.min(b.x), a.x.max(b.x));
    Mask::from_shape_fn(shape, |(y, x)| {
        y >= top && y <= bottom && x >= left && x <= right
    })
}

/// Even-odd fill of a closed polygon, sampled at pixel centres.
pub fn polygon_mask(shape: (usize, usize), vertices: &[Point]) -> Mask {
    if vertices.len() < 3 {
        return Mask::from_elem(shape, false);
    }
    let points = vertices
        .iter()
        .map(|point| (point.y as f32, point.x as f32))
        .collect::<Vec<_>>();
    Mask::from_shape_fn(shape, |(y, x)| {
        let (py, px) = (y as f32, x as f32);
        let mut inside = false;
        let mut previous = points[points.len() - 1];
        for current in &points {
            let (y0, x0) = previous;
            let (y1, x1) = *current;
            if (y0 > py) != (y1 > py) {
                let crossing = x0 + (py - y0) / (y1 - y0) * (x1 - x0);
                if px < crossing {
                    inside = !inside;
                }
            }
            previous = *current;
        }
        inside
    })
}
