use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use image::RgbImage;
use log::debug;
use ndarray::{Array1, Array3};

use crate::algorithms::{AlgorithmProvider, Image, Mask, roi_activity};
use crate::formats::{PlaneArchive, RoiArchive};
use crate::jobs::{
    DetectedPlane, DetectionInput, DetectionSettings, MotionCorrectionOutput, PlaneSelection,
    RoiDetectionOutput,
};
use crate::model::{ConfigValue, LabelMap, Params, RoiSets, Video, without_labels};

use super::editing::RoiEditor;
use super::history::{EditStore, HistorySnapshot};
use super::masks::{MaskEditor, PlaneMasks};
use super::mode::TransitionGuard;
use super::render::{overlay, render};
use super::{Mode, Result, SessionError};

/// Working ROI state of one plane.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneRois {
    pub(super) label_map: LabelMap,
    pub(super) sets: RoiSets,
    pub(super) areas: BTreeMap<u32, f32>,
    pub(super) circularities: BTreeMap<u32, f32>,
    /// Cached colouring of `label_map`; `None` after the map changes.
    pub(super) overlay: Option<Array3<u8>>,
}

impl PlaneRois {
    fn from_detection(plane: DetectedPlane) -> Self {
        Self {
            label_map: plane.label_map,
            sets: RoiSets::new(plane.filtered_out),
            areas: plane.areas,
            circularities: plane.circularities,
            overlay: None,
        }
    }

    fn from_archive(plane: &PlaneArchive) -> Result<Self> {
        Ok(Self {
            label_map: plane.label_map()?,
            sets: plane.sets(),
            areas: plane.areas.clone(),
            circularities: plane.circularities.clone(),
            overlay: None,
        })
    }

    pub fn label_map(&self) -> &LabelMap {
        &self.label_map
    }

    pub fn sets(&self) -> &RoiSets {
        &self.sets
    }

    pub fn areas(&self) -> &BTreeMap<u32, f32> {
        &self.areas
    }

    pub fn circularities(&self) -> &BTreeMap<u32, f32> {
        &self.circularities
    }
}

/// Everything the presentation layer reads and edits for the open video.
pub struct SessionState {
    pub(super) params: Params,
    pub(super) provider: Arc<dyn AlgorithmProvider>,
    queue: Vec<PathBuf>,
    video: Option<Arc<Video>>,
    mc_video: Option<Arc<Video>>,
    dynamic_range: f32,
    mode: Mode,
    pub(super) current_z: usize,
    mean_images: Vec<Image>,
    means_from_mc: bool,
    pub(super) adjusted: Option<Image>,
    background: Option<Mask>,
    masks: Vec<PlaneMasks>,
    pub(super) rois: Vec<PlaneRois>,
    rois_found_with_mc: Option<bool>,
    detection_stale: bool,
    pub(super) history: EditStore,
    pub(super) selection: Option<u32>,
    pub(super) rendered: Option<RgbImage>,
    /// `Some(changed)` while an erase gesture is open.
    pub(super) erase_gesture: Option<bool>,
}

impl SessionState {
    pub fn new(params: Params, provider: Arc<dyn AlgorithmProvider>) -> Self {
        Self {
            params,
            provider,
            queue: Vec::new(),
            video: None,
            mc_video: None,
            dynamic_range: 255.0,
            mode: Mode::MotionCorrecting,
            current_z: 0,
            mean_images: Vec::new(),
            means_from_mc: false,
            adjusted: None,
            background: None,
            masks: Vec::new(),
            rois: Vec::new(),
            rois_found_with_mc: None,
            detection_stale: true,
            history: EditStore::default(),
            selection: None,
            rendered: None,
            erase_gesture: None,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn queue(&self) -> &[PathBuf] {
        &self.queue
    }

    pub fn set_queue(&mut self, paths: Vec<PathBuf>) {
        self.queue = paths;
    }

    /// Drops one queued path. Returns `true` when the open video (index 0) was removed.
    pub fn remove_queued(&mut self, index: usize) -> Result<bool> {
        if index >= self.queue.len() {
            return Err(SessionError::InvalidOperation(format!(
                "no queued video at index {index}"
            )));
        }
        self.queue.remove(index);
        Ok(index == 0)
    }

    /// Replaces the open video and discards everything derived from the previous one.
    pub fn open_video(&mut self, video: Video) {
        let planes = video.planes();
        self.dynamic_range = self
            .params
            .dynamic_range_max
            .unwrap_or_else(|| video.dynamic_range());
        self.video = Some(Arc::new(video));
        self.mc_video = None;
        self.mode = Mode::MotionCorrecting;
        self.current_z = 0;
        self.mean_images.clear();
        self.means_from_mc = false;
        self.adjusted = None;
        self.background = None;
        self.masks = vec![PlaneMasks::default(); planes];
        self.discard_rois(planes);
        self.detection_stale = true;
    }

    pub fn close_video(&mut self) {
        self.video = None;
        self.mc_video = None;
        self.mode = Mode::MotionCorrecting;
        self.current_z = 0;
        self.mean_images.clear();
        self.adjusted = None;
        self.background = None;
        self.masks.clear();
        self.discard_rois(0);
        self.detection_stale = true;
    }

    fn discard_rois(&mut self, planes: usize) {
        self.rois.clear();
        self.rois_found_with_mc = None;
        self.history = EditStore::new(planes);
        self.selection = None;
        self.rendered = None;
        self.erase_gesture = None;
    }

    pub fn video(&self) -> Option<&Arc<Video>> {
        self.video.as_ref()
    }

    pub fn mc_video(&self) -> Option<&Arc<Video>> {
        self.mc_video.as_ref()
    }

    pub fn dynamic_range(&self) -> f32 {
        self.dynamic_range
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn current_plane(&self) -> usize {
        self.current_z
    }

    pub fn planes(&self) -> usize {
        self.video.as_ref().map_or(0, |video| video.planes())
    }

    pub fn has_rois(&self) -> bool {
        !self.rois.is_empty()
    }

    pub fn plane_rois(&self, z: usize) -> Option<&PlaneRois> {
        self.rois.get(z)
    }

    pub fn label_map(&self, z: usize) -> Option<&LabelMap> {
        self.rois.get(z).map(|plane| &plane.label_map)
    }

    pub fn roi_sets(&self, z: usize) -> Option<&RoiSets> {
        self.rois.get(z).map(|plane| &plane.sets)
    }

    pub fn selection(&self) -> Option<u32> {
        self.selection
    }

    pub fn rendered(&self) -> Option<&RgbImage> {
        self.rendered.as_ref()
    }

    pub fn adjusted_image(&self) -> Option<&Image> {
        self.adjusted.as_ref()
    }

    pub fn background_mask(&self) -> Option<&Mask> {
        self.background.as_ref()
    }

    pub fn mean_images(&self) -> &[Image] {
        &self.mean_images
    }

    pub fn history_len(&self, z: usize) -> usize {
        self.history.len(z)
    }

    pub fn plane_masks(&self, z: usize) -> Option<&PlaneMasks> {
        self.masks.get(z)
    }

    fn uses_mc(&self) -> bool {
        self.params.use_mc_video && self.mc_video.is_some()
    }

    /// Video that detection and activity traces read from.
    pub fn detection_source(&self) -> Result<(Arc<Video>, bool)> {
        if self.uses_mc() {
            if let Some(video) = &self.mc_video {
                return Ok((Arc::clone(video), true));
            }
        }
        let video = self.video.as_ref().ok_or(SessionError::NoVideo)?;
        Ok((Arc::clone(video), false))
    }

    pub fn set_mode(&mut self, to: Mode) -> Result<()> {
        let guard = TransitionGuard {
            has_video: self.video.is_some(),
            has_rois: self.has_rois(),
        };
        let next = self.mode.transition(to, guard)?;
        if next == self.mode {
            return Ok(());
        }
        self.end_erase_gesture();
        self.selection = None;
        match next {
            Mode::MotionCorrecting => {}
            Mode::RoiFinding => {
                if self.detection_stale
                    || self.mean_images.is_empty()
                    || self.means_from_mc != self.uses_mc()
                {
                    self.recompute_detection_inputs()?;
                }
                self.refresh_plane_images();
                self.refresh_render();
            }
            Mode::RoiFiltering => {
                if self.mean_images.is_empty() {
                    self.recompute_detection_inputs_keeping_rois()?;
                }
                self.refresh_plane_images();
                self.refresh_render();
                self.commit_if_new();
            }
        }
        debug!("mode {:?} -> {next:?}", self.mode);
        self.mode = next;
        Ok(())
    }

    fn compute_means(&self) -> Result<(Vec<Image>, bool)> {
        let (source, from_mc) = self.detection_source()?;
        let means = source
            .mean_images()
            .into_iter()
            .map(|mean| {
                if self.params.apply_blur {
                    self.provider.smooth(&mean)
                } else {
                    mean
                }
            })
            .collect();
        Ok((means, from_mc))
    }

    fn recompute_detection_inputs(&mut self) -> Result<()> {
        let (means, from_mc) = self.compute_means()?;
        self.mean_images = means;
        self.means_from_mc = from_mc;
        self.detection_stale = false;
        let planes = self.planes();
        self.discard_rois(planes);
        Ok(())
    }

    fn recompute_detection_inputs_keeping_rois(&mut self) -> Result<()> {
        let (means, from_mc) = self.compute_means()?;
        self.mean_images = means;
        self.means_from_mc = from_mc;
        self.detection_stale = false;
        Ok(())
    }

    /// Adjusted image and background mask of the current plane.
    pub(super) fn refresh_plane_images(&mut self) {
        let Some(mean) = self.mean_images.get(self.current_z) else {
            self.adjusted = None;
            self.background = None;
            return;
        };
        let adjusted = self
            .provider
            .adjust_image(mean, self.params.contrast, self.params.gamma);
        self.background = Some(self.provider.background_mask(
            &adjusted,
            self.params.background_threshold,
            self.dynamic_range,
        ));
        self.adjusted = Some(adjusted);
    }

    pub(super) fn refresh_render(&mut self) {
        let z = self.current_z;
        let Some(plane) = self.rois.get_mut(z) else {
            self.rendered = None;
            return;
        };
        if plane.overlay.is_none() {
            plane.overlay = Some(overlay(&plane.label_map));
        }
        let Some(overlay) = plane.overlay.as_ref() else {
            return;
        };
        let fallback;
        let adjusted = match &self.adjusted {
            Some(adjusted) => adjusted,
            None => {
                fallback = Image::zeros(plane.label_map.dim());
                &fallback
            }
        };
        self.rendered = Some(render(
            adjusted,
            overlay,
            &plane.label_map,
            &plane.sets,
            self.selection,
        ));
    }

    pub(super) fn snapshot(&mut self) -> Option<HistorySnapshot> {
        self.refresh_render();
        let plane = self.rois.get(self.current_z)?;
        Some(HistorySnapshot {
            label_map: plane.label_map.clone(),
            overlay: plane.overlay.clone()?,
            sets: plane.sets.clone(),
            areas: plane.areas.clone(),
            circularities: plane.circularities.clone(),
            rendered: self.rendered.clone()?,
            adjusted: self
                .adjusted
                .clone()
                .unwrap_or_else(|| Image::zeros(plane.label_map.dim())),
        })
    }

    pub(super) fn commit(&mut self) {
        if let Some(snapshot) = self.snapshot() {
            self.history.commit(self.current_z, snapshot);
        }
    }

    pub(super) fn commit_if_new(&mut self) {
        if !self.history.is_empty(self.current_z) {
            return;
        }
        if let Some(snapshot) = self.snapshot() {
            self.history.commit_if_new(self.current_z, snapshot);
        }
    }

    pub(super) fn restore(&mut self, snapshot: HistorySnapshot) {
        let Some(plane) = self.rois.get_mut(self.current_z) else {
            return;
        };
        plane.label_map = snapshot.label_map;
        plane.overlay = Some(snapshot.overlay);
        plane.sets = snapshot.sets;
        plane.sets.recompute_removed();
        plane.areas = snapshot.areas;
        plane.circularities = snapshot.circularities;
        self.adjusted = Some(snapshot.adjusted);
        self.selection = None;
        self.refresh_render();
    }

    /// Re-runs the automatic area/circularity filter on the current plane.
    pub(super) fn refilter_current(&mut self) {
        let bounds = self.params.roi_bounds();
        let Some(plane) = self.rois.get_mut(self.current_z) else {
            return;
        };
        let blank;
        let mean = match self.mean_images.get(self.current_z) {
            Some(mean) => mean,
            None => {
                blank = Image::zeros(plane.label_map.dim());
                &blank
            }
        };
        let result = self.provider.filter_rois(
            mean,
            &plane.label_map,
            &bounds,
            &plane.areas,
            &plane.circularities,
        );
        plane.sets.set_filtered_out(result.filtered_out);
        if let Some(label) = self.selection {
            if plane.sets.is_removed(label) {
                self.selection = None;
            }
        }
    }

    pub(super) fn end_erase_gesture(&mut self) {
        if let Some(changed) = self.erase_gesture.take() {
            if changed {
                self.commit();
            }
        }
    }

    pub fn set_plane(&mut self, z: usize) -> Result<()> {
        let planes = self.planes();
        if self.video.is_none() {
            return Err(SessionError::NoVideo);
        }
        if z >= planes {
            return Err(SessionError::PlaneOutOfRange { z, planes });
        }
        self.end_erase_gesture();
        self.selection = None;
        self.current_z = z;
        if let Some(masks) = self.masks.get_mut(z) {
            masks.clear_selection();
        }
        match self.mode {
            Mode::MotionCorrecting => {}
            Mode::RoiFinding => {
                self.refresh_plane_images();
                self.refresh_render();
            }
            Mode::RoiFiltering => {
                self.refresh_plane_images();
                self.refilter_current();
                self.refresh_render();
                self.commit_if_new();
            }
        }
        Ok(())
    }

    /// Applies one setting and refreshes whatever depends on it.
    pub fn set_config(&mut self, value: ConfigValue) -> Result<()> {
        let previous = self.params.clone();
        self.params.apply(value)?;
        match value {
            ConfigValue::ApplyBlur(blur) if blur != previous.apply_blur => {
                self.detection_stale = true;
            }
            ConfigValue::DynamicRangeMax(max) => {
                if let Some(video) = &self.video {
                    self.dynamic_range = max.unwrap_or_else(|| video.dynamic_range());
                }
                self.refresh_if_roi_mode();
            }
            ConfigValue::Contrast(_)
            | ConfigValue::Gamma(_)
            | ConfigValue::BackgroundThreshold(_) => self.refresh_if_roi_mode(),
            _ => {}
        }
        Ok(())
    }

    fn refresh_if_roi_mode(&mut self) {
        if self.mode.is_roi_mode() {
            self.refresh_plane_images();
            self.refresh_render();
        }
    }

    pub fn detection_settings(&self) -> DetectionSettings {
        DetectionSettings::from_params(&self.params, self.dynamic_range)
    }

    /// Owned per-plane inputs for a detection job. Only available while finding ROIs.
    pub fn detection_inputs(&self) -> Result<(Vec<DetectionInput>, bool)> {
        if self.mode != Mode::RoiFinding {
            return Err(SessionError::InvalidOperation(
                "ROI detection runs from the ROI finding mode".into(),
            ));
        }
        let inputs = self
            .mean_images
            .iter()
            .enumerate()
            .map(|(z, mean)| DetectionInput {
                mean_image: mean.clone(),
                mask: self
                    .masks
                    .get(z)
                    .and_then(|masks| masks.combined(self.params.invert_masks)),
            })
            .collect();
        Ok((inputs, self.means_from_mc))
    }

    /// Source video and plane selection for a motion correction job.
    ///
    /// Single-plane runs start from the existing corrected video so earlier planes are kept.
    pub fn motion_correction_request(&self) -> Result<(Arc<Video>, PlaneSelection)> {
        let video = self.video.as_ref().ok_or(SessionError::NoVideo)?;
        if self.params.mc_current_z {
            let source = self.mc_video.as_ref().unwrap_or(video);
            Ok((Arc::clone(source), PlaneSelection::Single(self.current_z)))
        } else {
            Ok((Arc::clone(video), PlaneSelection::All))
        }
    }

    pub fn apply_motion_correction(&mut self, output: MotionCorrectionOutput) -> Result<()> {
        let video = self.video.as_ref().ok_or(SessionError::NoVideo)?;
        if output.video.data().dim() != video.data().dim() {
            return Err(SessionError::ShapeMismatch {
                expected: video.frame_shape(),
                found: output.video.frame_shape(),
            });
        }
        if output.video.is_degenerate() {
            return Err(SessionError::InvalidOperation(
                "motion corrected video is empty".into(),
            ));
        }
        self.mc_video = Some(Arc::new(output.video));
        self.detection_stale = true;
        Ok(())
    }

    pub fn apply_detection(&mut self, output: RoiDetectionOutput) -> Result<()> {
        let video = self.video.as_ref().ok_or(SessionError::NoVideo)?;
        let shape = video.frame_shape();
        if output.planes.len() != video.planes() {
            return Err(SessionError::InvalidOperation(format!(
                "detection returned {} planes for a {}-plane video",
                output.planes.len(),
                video.planes()
            )));
        }
        if let Some(plane) = output
            .planes
            .iter()
            .find(|plane| plane.label_map.dim() != shape)
        {
            return Err(SessionError::ShapeMismatch {
                expected: shape,
                found: plane.label_map.dim(),
            });
        }
        let planes = output.planes.len();
        self.discard_rois(planes);
        self.rois = output
            .planes
            .into_iter()
            .map(PlaneRois::from_detection)
            .collect();
        self.rois_found_with_mc = Some(output.used_mc_video);
        self.refresh_render();
        self.commit();
        Ok(())
    }

    /// Label maps with removed ROIs cleared, one per plane.
    pub fn export_label_maps(&self) -> Vec<LabelMap> {
        self.rois
            .iter()
            .map(|plane| without_labels(&plane.label_map, plane.sets.removed()))
            .collect()
    }

    pub fn roi_archive(&self) -> Option<RoiArchive> {
        if self.rois.is_empty() {
            return None;
        }
        Some(RoiArchive::new(
            self.rois
                .iter()
                .map(|plane| {
                    PlaneArchive::new(
                        &plane.label_map,
                        &plane.sets,
                        &plane.areas,
                        &plane.circularities,
                    )
                })
                .collect(),
        ))
    }

    /// Restores ROIs from an archive, resets history and enters ROI filtering.
    pub fn load_roi_archive(&mut self, archive: &RoiArchive) -> Result<()> {
        let video = self.video.as_ref().ok_or(SessionError::NoVideo)?;
        let shape = video.frame_shape();
        if archive.planes.len() != video.planes() {
            return Err(SessionError::InvalidOperation(format!(
                "archive holds {} planes for a {}-plane video",
                archive.planes.len(),
                video.planes()
            )));
        }
        let rois = archive
            .planes
            .iter()
            .map(PlaneRois::from_archive)
            .collect::<Result<Vec<_>>>()?;
        if let Some(plane) = rois.iter().find(|plane| plane.label_map.dim() != shape) {
            return Err(SessionError::ShapeMismatch {
                expected: shape,
                found: plane.label_map.dim(),
            });
        }

        if self.detection_stale || self.mean_images.is_empty() {
            self.recompute_detection_inputs()?;
        }
        let planes = rois.len();
        self.discard_rois(planes);
        self.rois = rois;
        self.rois_found_with_mc = Some(self.means_from_mc);
        self.mode = Mode::RoiFiltering;
        self.refresh_plane_images();
        self.refresh_render();
        self.commit();
        Ok(())
    }

    /// Mean intensity of the selected ROI in every frame of the current plane.
    pub fn selected_activity(&self) -> Option<Array1<f32>> {
        let label = self.selection?;
        let plane = self.rois.get(self.current_z)?;
        let video = match (self.rois_found_with_mc, &self.mc_video, &self.video) {
            (Some(true), Some(mc), _) => mc,
            (_, _, Some(video)) => video,
            _ => return None,
        };
        roi_activity(&plane.label_map, video.plane(self.current_z), label).ok()
    }

    /// ROI editing on the current plane; only while filtering with ROIs present.
    pub fn editor(&mut self) -> Option<RoiEditor<'_>> {
        if self.mode == Mode::RoiFiltering && self.has_rois() {
            Some(RoiEditor::new(self))
        } else {
            None
        }
    }

    /// Mask drawing on the current plane; only while finding ROIs.
    pub fn mask_editor(&mut self) -> Option<MaskEditor<'_>> {
        if self.mode != Mode::RoiFinding {
            return None;
        }
        let shape = self.video.as_ref()?.frame_shape();
        let invert = self.params.invert_masks;
        let plane = self.masks.get_mut(self.current_z)?;
        Some(MaskEditor::new(plane, shape, invert))
    }
}
