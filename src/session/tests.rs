use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ndarray::{Array2, Array4, s};

use super::*;
use crate::algorithms::{AlgorithmProvider, DefaultAlgorithms};
use crate::jobs::{DetectedPlane, MotionCorrectionOutput, PlaneSelection, RoiDetectionOutput};
use crate::model::{ConfigValue, LabelMap, Params, Point, Video, pixel_count};

fn video() -> Video {
    let data = Array4::from_shape_fn((3, 2, 10, 10), |(t, z, y, x)| {
        (y * 10 + x + t + z * 5) as f32
    });
    Video::new(data).expect("video")
}

fn labels() -> LabelMap {
    let mut map = LabelMap::zeros((10, 10));
    map.slice_mut(s![1..4, 1..4]).fill(1);
    map.slice_mut(s![1..4, 6..9]).fill(2);
    map.slice_mut(s![6..9, 1..4]).fill(3);
    map
}

fn detected() -> DetectedPlane {
    let label_map = labels();
    let areas = BTreeMap::from([(1, 9.0), (2, 9.0), (3, 9.0)]);
    let circularities = BTreeMap::from([(1, 0.78), (2, 0.78), (3, 0.78)]);
    DetectedPlane {
        label_map,
        areas,
        circularities,
        filtered_out: BTreeSet::from([3]),
    }
}

fn finding_session() -> SessionState {
    let mut session = SessionState::new(Params::default(), Arc::new(DefaultAlgorithms));
    session.open_video(video());
    session.set_mode(Mode::RoiFinding).expect("finding");
    session
}

fn filtering_session() -> SessionState {
    let mut session = finding_session();
    session
        .apply_detection(RoiDetectionOutput {
            planes: vec![detected(), detected()],
            used_mc_video: false,
        })
        .expect("detection");
    session.set_mode(Mode::RoiFiltering).expect("filtering");
    session
}

fn removed(session: &SessionState) -> BTreeSet<u32> {
    session.roi_sets(0).expect("sets").removed().clone()
}

fn assert_removed_invariant(session: &SessionState) {
    for z in 0..session.planes() {
        let sets = session.roi_sets(z).expect("sets");
        let expected = sets
            .filtered_out()
            .union(sets.erased())
            .copied()
            .collect::<BTreeSet<_>>();
        assert_eq!(sets.removed(), &expected);
    }
}

#[test]
fn erase_then_undo_restores_removed_set() {
    let mut session = filtering_session();
    assert_eq!(removed(&session), BTreeSet::from([3]));
    assert_eq!(session.history_len(0), 1);

    let mut editor = session.editor().expect("editor");
    editor.select(2).expect("select");
    assert!(editor.erase_selected());
    assert_eq!(editor.selection(), None);
    assert_eq!(removed(&session), BTreeSet::from([2, 3]));
    assert_eq!(session.history_len(0), 2);
    assert_removed_invariant(&session);

    assert!(session.editor().expect("editor").undo());
    assert_eq!(removed(&session), BTreeSet::from([3]));
    assert_eq!(session.label_map(0), Some(&labels()));
    assert_eq!(session.history_len(0), 1);
    assert!(!session.editor().expect("editor").undo());
}

#[test]
fn removed_labels_cannot_be_selected() {
    let mut session = filtering_session();
    let mut editor = session.editor().expect("editor");
    assert_eq!(editor.plane_index(), 0);
    assert_eq!(editor.visible_labels(), BTreeSet::from([1, 2]));
    assert!(editor.select(3).is_err());
    assert_eq!(editor.select_at(Point::new(7, 2)), None);
    assert_eq!(editor.select_at(Point::new(2, 2)), Some(1));
    assert_eq!(editor.select_at(Point::new(0, 0)), None);
    assert_eq!(editor.selection(), None);
}

#[test]
fn enlarge_grows_the_selected_roi() {
    let mut session = filtering_session();
    let mut editor = session.editor().expect("editor");
    assert!(!editor.enlarge());
    editor.select(1).expect("select");
    let before = pixel_count(editor.label_map(), 1);
    assert!(editor.enlarge());
    let after = pixel_count(editor.label_map(), 1);
    assert!(after > before);
    assert_eq!(after, 21);
    assert_eq!(session.plane_rois(0).expect("plane").areas()[&1], 21.0);
}

#[test]
fn shrinking_to_nothing_clears_the_selection() {
    let mut session = filtering_session();
    let mut editor = session.editor().expect("editor");
    editor.select(1).expect("select");
    assert!(editor.shrink());
    assert_eq!(pixel_count(editor.label_map(), 1), 1);
    assert_eq!(editor.selection(), Some(1));
    assert!(editor.shrink());
    assert_eq!(pixel_count(editor.label_map(), 1), 0);
    assert_eq!(editor.selection(), None);
    assert!(!editor.shrink());
}

#[test]
fn locked_rois_are_protected() {
    let mut session = filtering_session();
    let mut editor = session.editor().expect("editor");
    editor.select(2).expect("select");
    assert_eq!(editor.toggle_lock(), Some(true));
    assert!(!editor.erase_selected());
    assert!(!editor.enlarge());
    assert!(!editor.shrink());
    assert!(editor.erase_near(Point::new(2, 7), 1.0).is_empty());

    editor.select(1).expect("select");
    for _ in 0..4 {
        editor.enlarge();
    }
    assert_eq!(pixel_count(editor.label_map(), 2), 9);

    let created = editor
        .create_roi(RoiShape::Rect {
            a: Point::new(0, 5),
            b: Point::new(4, 9),
        })
        .expect("create");
    assert_eq!(pixel_count(editor.label_map(), 2), 9);
    assert!(pixel_count(editor.label_map(), created) > 0);
    assert_removed_invariant(&session);
}

#[test]
fn erase_gesture_is_a_single_history_entry() {
    let mut session = filtering_session();
    let mut editor = session.editor().expect("editor");
    editor.begin_erase();
    assert_eq!(editor.erase_near(Point::new(2, 2), 1.0), vec![1]);
    assert_eq!(editor.erase_near(Point::new(2, 7), 1.0), vec![2]);
    assert!(editor.erase_near(Point::new(5, 5), 0.0).is_empty());
    assert!(editor.end_erase());
    assert_eq!(session.history_len(0), 2);
    assert_eq!(removed(&session), BTreeSet::from([1, 2, 3]));

    let mut editor = session.editor().expect("editor");
    editor.begin_erase();
    assert!(!editor.end_erase());
    assert!(editor.undo());
    assert_eq!(removed(&session), BTreeSet::from([3]));
}

#[test]
fn created_rois_take_the_next_label() {
    let mut session = filtering_session();
    let mut editor = session.editor().expect("editor");
    let rect = editor
        .create_roi(RoiShape::Rect {
            a: Point::new(8, 8),
            b: Point::new(6, 6),
        })
        .expect("rect");
    assert_eq!(rect, 4);
    let disk = editor
        .create_roi(RoiShape::Disk {
            center: Point::new(5, 5),
            radius: 0.5,
        })
        .expect("disk");
    assert_eq!(disk, 5);
    assert_eq!(pixel_count(editor.label_map(), disk), 1);
    assert_eq!(session.history_len(0), 3);
}

#[test]
fn history_is_bounded_and_keeps_the_original() {
    let mut session = filtering_session();
    let mut editor = session.editor().expect("editor");
    editor.select(1).expect("select");
    for _ in 0..31 {
        editor.toggle_lock();
    }
    assert_eq!(session.history_len(0), HISTORY_CAPACITY);
    assert!(session.roi_sets(0).expect("sets").is_locked(1));

    let mut editor = session.editor().expect("editor");
    assert!(editor.reset_plane());
    assert_eq!(session.history_len(0), 1);
    assert!(session.roi_sets(0).expect("sets").locked().is_empty());
    assert_eq!(session.label_map(0), Some(&labels()));
}

#[test]
fn undo_reverses_a_sequence_of_edits() {
    let mut session = filtering_session();
    let mut editor = session.editor().expect("editor");
    editor.select(1).expect("select");
    editor.enlarge();
    editor.translate(1, 0);
    editor.select(2).expect("select");
    editor.erase_selected();
    assert_ne!(editor.label_map(), &labels());
    while editor.undo() {}
    assert_eq!(session.label_map(0), Some(&labels()));
    assert_eq!(removed(&session), BTreeSet::from([3]));
    assert_eq!(session.selection(), None);
}

#[test]
fn translate_moves_labels_and_drops_pixels_outside() {
    let mut session = filtering_session();
    let mut editor = session.editor().expect("editor");
    editor.translate(-2, 0);
    let map = editor.label_map();
    assert_eq!(map[(0, 2)], 1);
    assert_eq!(pixel_count(map, 1), 6);
    assert_eq!(map[(4, 2)], 3);
}

#[test]
fn filter_uses_current_bounds() {
    let mut session = filtering_session();
    session
        .set_config(ConfigValue::MinArea(1.0))
        .expect("min area");
    session.editor().expect("editor").apply_filter();
    assert!(removed(&session).is_empty());
    session
        .set_config(ConfigValue::MaxArea(5.0))
        .expect("max area");
    session.editor().expect("editor").apply_filter();
    assert_eq!(removed(&session), BTreeSet::from([1, 2, 3]));
    assert_removed_invariant(&session);
}

#[test]
fn editing_requires_the_filtering_mode() {
    let mut session = SessionState::new(Params::default(), Arc::new(DefaultAlgorithms));
    assert!(matches!(
        session.set_mode(Mode::RoiFinding),
        Err(SessionError::NoVideo)
    ));
    session.open_video(video());
    assert!(session.editor().is_none());
    assert!(session.mask_editor().is_none());
    assert!(matches!(
        session.set_mode(Mode::RoiFiltering),
        Err(SessionError::InvalidOperation(_))
    ));

    session.set_mode(Mode::RoiFinding).expect("finding");
    assert!(session.editor().is_none());
    assert!(session.mask_editor().is_some());
    assert!(session.adjusted_image().is_some());
    assert!(session.background_mask().is_some());
}

#[test]
fn background_follows_the_contrast_adjusted_image() {
    let mut session = SessionState::new(Params::default(), Arc::new(DefaultAlgorithms));
    session.open_video(video());
    session.set_mode(Mode::RoiFinding).expect("finding");
    let dim = |session: &SessionState| {
        session
            .background_mask()
            .expect("background")
            .iter()
            .filter(|background| **background)
            .count()
    };
    assert_eq!(dim(&session), 9);

    session
        .set_config(ConfigValue::Contrast(3.0))
        .expect("contrast");
    let adjusted = session.adjusted_image().expect("adjusted").clone();
    let expected = DefaultAlgorithms.background_mask(&adjusted, 10.0, session.dynamic_range());
    assert_eq!(session.background_mask(), Some(&expected));
    assert_eq!(dim(&session), 3);
}

#[test]
fn switching_planes_clears_selection_and_tracks_history() {
    let mut session = filtering_session();
    session.editor().expect("editor").select(1).expect("select");
    assert!(session.set_plane(5).is_err());
    session.set_plane(1).expect("plane 1");
    assert_eq!(session.selection(), None);
    assert_eq!(session.current_plane(), 1);
    assert_eq!(session.history_len(1), 1);
    assert!(session.rendered().is_some());
}

#[test]
fn masks_are_combined_and_inverted() {
    let mut session = finding_session();
    let square = [
        Point::new(0, 0),
        Point::new(0, 4),
        Point::new(4, 4),
        Point::new(4, 0),
    ];
    {
        let mut masks = session.mask_editor().expect("mask editor");
        assert!(masks.draw_polygon(&square[..2]).is_err());
        assert_eq!(masks.draw_polygon(&square).expect("draw"), 0);
    }
    let combined = session
        .plane_masks(0)
        .and_then(|plane| plane.combined(false))
        .expect("combined");
    assert!(combined[(2, 2)]);
    assert!(!combined[(8, 8)]);

    session
        .set_config(ConfigValue::InvertMasks(true))
        .expect("invert");
    let (inputs, _) = session.detection_inputs().expect("inputs");
    let mask = inputs[0].mask.as_ref().expect("mask");
    assert!(!mask[(2, 2)]);
    assert!(mask[(8, 8)]);
    assert!(inputs[1].mask.is_none());

    let mut masks = session.mask_editor().expect("mask editor");
    assert_eq!(masks.select_at(Point::new(2, 2)), None);
    assert_eq!(masks.select_at(Point::new(8, 8)), Some(0));
    assert!(masks.erase_selected());
    assert!(masks.masks().is_empty());
}

#[test]
fn roi_archive_roundtrip_enters_filtering() {
    let mut session = filtering_session();
    session.editor().expect("editor").select(1).expect("select");
    session.editor().expect("editor").erase_selected();
    let archive = session.roi_archive().expect("archive");

    let mut restored = SessionState::new(Params::default(), Arc::new(DefaultAlgorithms));
    restored.open_video(video());
    restored.load_roi_archive(&archive).expect("load");
    assert_eq!(restored.mode(), Mode::RoiFiltering);
    assert_eq!(restored.label_map(0), Some(&labels()));
    assert_eq!(removed(&restored), BTreeSet::from([1, 3]));
    assert_eq!(restored.history_len(0), 1);
    assert!(restored.editor().is_some());
}

#[test]
fn selected_activity_follows_the_selection() {
    let mut session = filtering_session();
    assert!(session.selected_activity().is_none());
    session.editor().expect("editor").select(1).expect("select");
    let activity = session.selected_activity().expect("activity");
    assert_eq!(activity.len(), 3);
    assert!(activity[1] > activity[0]);
}

#[test]
fn motion_correction_results_are_validated() {
    let mut session = finding_session();
    let empty = Video::new(Array4::zeros((3, 2, 10, 10))).expect("video");
    let result = session.apply_motion_correction(MotionCorrectionOutput {
        video: empty,
        selection: PlaneSelection::All,
    });
    assert!(result.is_err());
    assert!(session.mc_video().is_none());

    session
        .apply_detection(RoiDetectionOutput {
            planes: vec![detected(), detected()],
            used_mc_video: false,
        })
        .expect("detection");
    session
        .apply_motion_correction(MotionCorrectionOutput {
            video: video(),
            selection: PlaneSelection::All,
        })
        .expect("apply");
    assert!(session.mc_video().is_some());
    session
        .set_config(ConfigValue::UseMotionCorrected(true))
        .expect("use mc");
    session.set_mode(Mode::MotionCorrecting).expect("mc mode");
    session.set_mode(Mode::RoiFinding).expect("finding");
    assert!(!session.has_rois());
    let (_, from_mc) = session.detection_inputs().expect("inputs");
    assert!(from_mc);
}

#[test]
fn detection_output_must_match_the_video() {
    let mut session = finding_session();
    let mut wrong = detected();
    wrong.label_map = Array2::zeros((4, 4));
    assert!(matches!(
        session.apply_detection(RoiDetectionOutput {
            planes: vec![wrong, detected()],
            used_mc_video: false,
        }),
        Err(SessionError::ShapeMismatch { .. })
    ));
    assert!(!session.has_rois());
}

#[test]
fn edit_store_evicts_the_oldest_edit() {
    let session = filtering_session();
    let snapshot = |lock: u32| HistorySnapshot {
        label_map: labels(),
        overlay: overlay(&labels()),
        sets: crate::model::RoiSets::from_parts(
            BTreeSet::new(),
            BTreeSet::new(),
            BTreeSet::from([lock]),
        ),
        areas: BTreeMap::new(),
        circularities: BTreeMap::new(),
        rendered: session.rendered().cloned().expect("rendered"),
        adjusted: Array2::zeros((10, 10)),
    };
    let mut store = EditStore::new(1);
    assert!(store.commit_if_new(0, snapshot(100)));
    assert!(!store.commit_if_new(0, snapshot(101)));
    for lock in 0..25 {
        store.commit(0, snapshot(lock));
    }
    assert_eq!(store.len(0), HISTORY_CAPACITY);
    assert!(store.original(0).expect("original").sets.is_locked(100));
    assert!(store.top(0).expect("top").sets.is_locked(24));
    assert!(store.undo(0).expect("undo").sets.is_locked(23));
    assert!(store.reset(0).expect("reset").sets.is_locked(100));
    assert!(store.undo(0).is_none());
}

#[test]
fn mode_transition_table() {
    let guard = TransitionGuard {
        has_video: true,
        has_rois: false,
    };
    assert_eq!(
        Mode::MotionCorrecting.transition(Mode::RoiFinding, guard).expect("ok"),
        Mode::RoiFinding
    );
    assert!(Mode::RoiFinding.transition(Mode::RoiFiltering, guard).is_err());
    let guard = TransitionGuard {
        has_video: true,
        has_rois: true,
    };
    assert_eq!(
        Mode::RoiFinding.transition(Mode::RoiFiltering, guard).expect("ok"),
        Mode::RoiFiltering
    );
    assert_eq!(
        Mode::RoiFiltering.transition(Mode::RoiFiltering, guard).expect("ok"),
        Mode::RoiFiltering
    );
}

#[test]
fn render_hides_removed_and_highlights_selection() {
    let mut session = filtering_session();
    let rendered = session.rendered().expect("rendered").clone();
    let adjusted = session.adjusted_image().expect("adjusted").clone();
    let gray = adjusted[(7, 2)].round().clamp(0.0, 255.0) as u8;
    assert_eq!(rendered.get_pixel(2, 7).0, [gray; 3]);
    assert_ne!(rendered.get_pixel(2, 2).0, rendered.get_pixel(7, 2).0);

    session.editor().expect("editor").select(1).expect("select");
    let selected = session.rendered().expect("rendered");
    assert_ne!(selected.get_pixel(2, 2), rendered.get_pixel(2, 2));
    assert_eq!(label_color(0), [0, 0, 0]);
    assert_ne!(label_color(1), label_color(2));
}
