use ndarray::Zip;

use crate::algorithms::{Mask, polygon_mask};
use crate::model::Point;

use super::{Result, SessionError};

/// A user-drawn polygon, rasterized to the plane's shape.
#[derive(Debug, Clone, PartialEq)]
pub struct UserMask {
    vertices: Vec<Point>,
    region: Mask,
}

impl UserMask {
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Pixels inside the drawn polygon.
    pub fn region(&self) -> &Mask {
        &self.region
    }

    /// Pixels the mask allows: the region, or its complement when masks are inverted.
    pub fn effective(&self, invert: bool) -> Mask {
        if invert {
            self.region.mapv(|inside| !inside)
        } else {
            self.region.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaneMasks {
    masks: Vec<UserMask>,
    selected: Option<usize>,
}

impl PlaneMasks {
    pub fn masks(&self) -> &[UserMask] {
        &self.masks
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub(crate) fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Union of the drawn regions, or the intersection of their complements when inverted.
    /// `None` when nothing has been drawn.
    pub fn combined(&self, invert: bool) -> Option<Mask> {
        let (first, rest) = self.masks.split_first()?;
        let mut combined = first.effective(invert);
        for mask in rest {
            Zip::from(&mut combined)
                .and(&mask.region)
                .for_each(|value, inside| {
                    if invert {
                        *value &= !*inside;
                    } else {
                        *value |= *inside;
                    }
                });
        }
        Some(combined)
    }
}

/// Mask drawing for the current plane; handed out only while finding ROIs.
pub struct MaskEditor<'a> {
    plane: &'a mut PlaneMasks,
    shape: (usize, usize),
    invert: bool,
}

impl<'a> MaskEditor<'a> {
    pub(crate) fn new(plane: &'a mut PlaneMasks, shape: (usize, usize), invert: bool) -> Self {
        Self {
            plane,
            shape,
            invert,
        }
    }

    /// Rasterizes a closed polygon and returns its index.
    pub fn draw_polygon(&mut self, vertices: &[Point]) -> Result<usize> {
        if vertices.len() < 3 {
            return Err(SessionError::InvalidOperation(
                "a mask needs at least three vertices".into(),
            ));
        }
        let region = polygon_mask(self.shape, vertices);
        self.plane.masks.push(UserMask {
            vertices: vertices.to_vec(),
            region,
        });
        self.plane.selected = None;
        Ok(self.plane.masks.len() - 1)
    }

    /// Selects the most recently drawn mask whose allowed area contains `point`.
    pub fn select_at(&mut self, point: Point) -> Option<usize> {
        let invert = self.invert;
        self.plane.selected = self
            .plane
            .masks
            .iter()
            .rposition(|mask| mask.region.get((point.y, point.x)).copied() == Some(!invert));
        self.plane.selected
    }

    /// Removes the selected mask. Returns `false` without a selection.
    pub fn erase_selected(&mut self) -> bool {
        match self.plane.selected.take() {
            Some(index) if index < self.plane.masks.len() => {
                self.plane.masks.remove(index);
                true
            }
            _ => false,
        }
    }

    pub fn masks(&self) -> &[UserMask] {
        self.plane.masks()
    }

    pub fn selected(&self) -> Option<usize> {
        self.plane.selected
    }
}
