use std::collections::BTreeSet;

use log::debug;

use crate::algorithms::{dilate, disk_mask, erode, measure_labels, rect_mask};
use crate::model::{
    LabelMap, Point, label_at, label_mask, label_set, max_label, paint, pixel_count,
    shift_label_map,
};

use super::state::PlaneRois;
use super::{Result, SessionError, SessionState};

/// Geometry of a hand-drawn ROI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoiShape {
    /// Inclusive rectangle spanned by two corners.
    Rect { a: Point, b: Point },
    Disk { center: Point, radius: f32 },
}

/// Edits the current plane's ROIs. Obtained from [`SessionState::editor`].
pub struct RoiEditor<'a> {
    state: &'a mut SessionState,
}

impl<'a> RoiEditor<'a> {
    pub(super) fn new(state: &'a mut SessionState) -> Self {
        Self { state }
    }

    fn plane(&self) -> &PlaneRois {
        &self.state.rois[self.state.current_z]
    }

    fn plane_mut(&mut self) -> &mut PlaneRois {
        let z = self.state.current_z;
        &mut self.state.rois[z]
    }

    pub fn plane_index(&self) -> usize {
        self.state.current_z
    }

    pub fn selection(&self) -> Option<u32> {
        self.state.selection
    }

    pub fn label_map(&self) -> &LabelMap {
        &self.plane().label_map
    }

    /// Swaps in an edited label map, invalidates the overlay and re-measures every ROI.
    fn replace_label_map(&mut self, label_map: LabelMap) {
        let (areas, circularities) = measure_labels(&label_map);
        let plane = self.plane_mut();
        plane.label_map = label_map;
        plane.areas = areas;
        plane.circularities = circularities;
        plane.overlay = None;
        if let Some(label) = self.state.selection {
            if pixel_count(&self.plane().label_map, label) == 0 {
                self.state.selection = None;
            }
        }
    }

    /// Selects the visible ROI under `point`, or clears the selection on background.
    pub fn select_at(&mut self, point: Point) -> Option<u32> {
        let plane = self.plane();
        let label = label_at(&plane.label_map, point).filter(|label| !plane.sets.is_removed(*label));
        self.state.selection = label;
        self.state.refresh_render();
        label
    }

    pub fn select(&mut self, label: u32) -> Result<()> {
        let plane = self.plane();
        if label == 0 || plane.sets.is_removed(label) || pixel_count(&plane.label_map, label) == 0
        {
            return Err(SessionError::InvalidOperation(format!(
                "ROI {label} cannot be selected"
            )));
        }
        self.state.selection = Some(label);
        self.state.refresh_render();
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.state.selection = None;
        self.state.refresh_render();
    }

    /// Selected label unless it is locked.
    fn editable_selection(&self) -> Option<u32> {
        let label = self.state.selection.filter(|label| *label > 0)?;
        if self.plane().sets.is_locked(label) {
            debug!("ROI {label} is locked");
            return None;
        }
        Some(label)
    }

    pub fn erase_selected(&mut self) -> bool {
        let Some(label) = self.editable_selection() else {
            return false;
        };
        self.plane_mut().sets.erase(label);
        self.state.selection = None;
        self.state.commit();
        true
    }

    /// Opens an erase gesture; everything erased until [`Self::end_erase`] is one undo step.
    pub fn begin_erase(&mut self) {
        self.state.end_erase_gesture();
        self.state.erase_gesture = Some(false);
    }

    /// Erases every visible, unlocked ROI touching a disk around `point`.
    pub fn erase_near(&mut self, point: Point, radius: f32) -> Vec<u32> {
        let one_shot = self.state.erase_gesture.is_none();
        if one_shot {
            self.begin_erase();
        }

        let plane = self.plane();
        let brush = disk_mask(plane.label_map.dim(), point, radius);
        let touched = plane
            .label_map
            .iter()
            .zip(brush.iter())
            .filter(|(label, inside)| **inside && **label > 0)
            .map(|(label, _)| *label)
            .filter(|label| !plane.sets.is_removed(*label) && !plane.sets.is_locked(*label))
            .collect::<BTreeSet<_>>();

        for label in &touched {
            self.plane_mut().sets.erase(*label);
        }
        if !touched.is_empty() {
            if self
                .state
                .selection
                .is_some_and(|label| touched.contains(&label))
            {
                self.state.selection = None;
            }
            self.state.erase_gesture = Some(true);
            self.state.refresh_render();
        }

        if one_shot {
            self.end_erase();
        }
        touched.into_iter().collect()
    }

    /// Closes the gesture. Returns whether a history entry was recorded.
    pub fn end_erase(&mut self) -> bool {
        let changed = self.state.erase_gesture == Some(true);
        self.state.end_erase_gesture();
        changed
    }

    /// Grows the selected ROI by one pixel without painting over locked ROIs.
    pub fn enlarge(&mut self) -> bool {
        let Some(label) = self.editable_selection() else {
            return false;
        };
        let plane = self.plane();
        let grown = dilate(&label_mask(&plane.label_map, label), 1);
        let protected = plane.sets.locked().clone();
        let mut label_map = plane.label_map.clone();
        paint(&mut label_map, &grown, label, &protected);
        if label_map == plane.label_map {
            return false;
        }
        self.replace_label_map(label_map);
        self.state.commit();
        true
    }

    /// Erodes the selected ROI by one pixel; an ROI that disappears is deselected.
    pub fn shrink(&mut self) -> bool {
        let Some(label) = self.editable_selection() else {
            return false;
        };
        let plane = self.plane();
        let shrunk = erode(&label_mask(&plane.label_map, label), 1);
        let mut label_map = plane
            .label_map
            .mapv(|value| if value == label { 0 } else { value });
        paint(&mut label_map, &shrunk, label, &BTreeSet::new());
        self.replace_label_map(label_map);
        self.state.commit();
        true
    }

    /// Returns the new lock state, or `None` without a selection.
    pub fn toggle_lock(&mut self) -> Option<bool> {
        let label = self.state.selection.filter(|label| *label > 0)?;
        let locked = self.plane_mut().sets.toggle_lock(label);
        self.state.commit();
        Some(locked)
    }

    /// Paints a new ROI with the next unused label and returns that label.
    pub fn create_roi(&mut self, shape: RoiShape) -> Result<u32> {
        let plane = self.plane();
        let dim = plane.label_map.dim();
        let known = plane
            .sets
            .filtered_out()
            .iter()
            .chain(plane.sets.erased())
            .chain(plane.sets.locked())
            .copied()
            .max()
            .unwrap_or(0);
        let label = max_label(&plane.label_map).max(known) + 1;
        let mask = match shape {
            RoiShape::Rect { a, b } => rect_mask(dim, a, b),
            RoiShape::Disk { center, radius } => disk_mask(dim, center, radius),
        };
        let mut label_map = plane.label_map.clone();
        paint(&mut label_map, &mask, label, plane.sets.locked());
        if pixel_count(&label_map, label) == 0 {
            return Err(SessionError::InvalidOperation(
                "the new ROI does not cover any free pixel".into(),
            ));
        }
        self.replace_label_map(label_map);
        self.state.commit();
        Ok(label)
    }

    /// Moves the whole plane's label map by (dy, dx); pixels shifted out are dropped.
    pub fn translate(&mut self, dy: i32, dx: i32) {
        let shifted = shift_label_map(&self.plane().label_map, dy, dx);
        self.replace_label_map(shifted);
        self.state.commit();
    }

    /// Re-runs the automatic area/circularity filter with the current bounds.
    pub fn apply_filter(&mut self) {
        self.state.refilter_current();
        self.state.commit();
    }

    pub fn undo(&mut self) -> bool {
        self.state.end_erase_gesture();
        let z = self.state.current_z;
        match self.state.history.undo(z).cloned() {
            Some(snapshot) => {
                self.state.restore(snapshot);
                true
            }
            None => false,
        }
    }

    /// Restores the plane's original snapshot and drops every later edit.
    pub fn reset_plane(&mut self) -> bool {
        self.state.erase_gesture = None;
        let z = self.state.current_z;
        match self.state.history.reset(z).cloned() {
            Some(snapshot) => {
                self.state.restore(snapshot);
                true
            }
            None => false,
        }
    }

    /// Labels present on the current plane that are not removed.
    pub fn visible_labels(&self) -> BTreeSet<u32> {
        let plane = self.plane();
        label_set(&plane.label_map)
            .into_iter()
            .filter(|label| !plane.sets.is_removed(*label))
            .collect()
    }
}
