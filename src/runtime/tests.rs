use std::path::{Path, PathBuf};
use std::time::Duration;

use ndarray::{Array2, Array4, s};
use tempfile::tempdir;

use super::*;
use crate::formats::{PlaneOutputs, output_dir_for, write_video};
use crate::jobs::{JobKind, JobProgress};
use crate::model::{Params, Point, Video};
use crate::session::Mode;

const TIMEOUT: Duration = Duration::from_secs(20);

fn two_squares() -> Array2<f32> {
    let mut image = Array2::<f32>::zeros((20, 20));
    image.slice_mut(s![3..7, 3..7]).fill(200.0);
    image.slice_mut(s![12..16, 12..16]).fill(200.0);
    image
}

fn write_recording(dir: &Path, name: &str) -> PathBuf {
    let frame = two_squares();
    let mut data = Array4::<f32>::zeros((2, 1, 20, 20));
    for t in 0..2 {
        data.slice_mut(s![t, 0, .., ..]).assign(&frame);
    }
    let path = dir.join(name);
    write_video(&path, &Video::new(data).expect("video")).expect("write");
    path
}

fn finished(updates: &[JobUpdate], kind: JobKind) -> Option<JobProgress> {
    updates
        .iter()
        .rev()
        .find(|update| update.kind == kind && !matches!(update.progress, JobProgress::Running(_)))
        .map(|update| update.progress)
}

fn detected(dir: &Path) -> (AppContext, PathBuf) {
    let path = write_recording(dir, "cells.tif");
    let mut app = AppContext::new(Params::default());
    app.dispatch(Intent::ImportVideos(vec![path.clone()]))
        .expect("import");
    app.dispatch(Intent::SwitchMode(Mode::RoiFinding))
        .expect("finding");
    app.dispatch(Intent::ToggleJob(JobKind::RoiDetection))
        .expect("detect");
    let updates = app.wait_for_job(TIMEOUT);
    assert_eq!(
        finished(&updates, JobKind::RoiDetection),
        Some(JobProgress::Done)
    );
    (app, path)
}

#[test]
fn import_opens_the_first_video_and_keeps_the_queue() {
    let dir = tempdir().expect("tempdir");
    let first = write_recording(dir.path(), "a.tif");
    let second = write_recording(dir.path(), "b.tif");
    let mut app = AppContext::new(Params::default());
    app.dispatch(Intent::ImportVideos(vec![first.clone(), second.clone()]))
        .expect("import");

    let video = app.session().video().expect("video");
    assert_eq!(video.source(), Some(first.as_path()));
    assert_eq!(video.frames(), 2);
    assert_eq!(video.planes(), 1);
    assert_eq!(app.session().queue(), &[first, second.clone()]);

    app.dispatch(Intent::RemoveQueued(0)).expect("remove");
    let video = app.session().video().expect("next video");
    assert_eq!(video.source(), Some(second.as_path()));

    app.dispatch(Intent::RemoveQueued(0)).expect("remove last");
    assert!(app.session().video().is_none());
    assert!(app.session().queue().is_empty());
}

#[test]
fn import_skips_unsupported_files() {
    let dir = tempdir().expect("tempdir");
    let video = write_recording(dir.path(), "cells.TIF");
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "not a video").expect("notes");
    let mut app = AppContext::new(Params::default());
    app.dispatch(Intent::ImportVideos(vec![notes.clone()]))
        .expect("ignored");
    assert!(app.session().video().is_none());

    app.dispatch(Intent::ImportVideos(vec![notes, video.clone()]))
        .expect("import");
    assert_eq!(app.session().queue(), &[video]);
    assert!(app.session().video().is_some());
}

#[test]
fn importing_a_missing_file_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let mut app = AppContext::new(Params::default());
    let result = app.dispatch(Intent::ImportVideos(vec![dir.path().join("missing.tif")]));
    assert!(matches!(result, Err(AppError::Format(_))));
    assert!(app.session().video().is_none());
}

#[test]
fn invalid_requests_are_ignored() {
    let dir = tempdir().expect("tempdir");
    let path = write_recording(dir.path(), "cells.tif");
    let mut app = AppContext::new(Params::default());
    app.dispatch(Intent::Enlarge).expect("ignored");
    app.dispatch(Intent::ToggleJob(JobKind::BatchProcessing))
        .expect("ignored");
    app.dispatch(Intent::ImportVideos(vec![path])).expect("import");
    app.dispatch(Intent::SwitchMode(Mode::RoiFiltering))
        .expect("ignored");
    assert_eq!(app.session().mode(), Mode::MotionCorrecting);
    app.dispatch(Intent::ToggleJob(JobKind::RoiDetection))
        .expect("ignored");
    assert!(!app.is_busy());

    let target = dir.path().join("mc.tif");
    app.dispatch(Intent::SaveMotionCorrectedVideo(target.clone()))
        .expect("ignored");
    assert!(!target.exists());
    assert!(matches!(
        app.dispatch(Intent::SwitchPlane(3)),
        Err(AppError::Session(_))
    ));
}

#[test]
fn detection_results_feed_the_editor() {
    let dir = tempdir().expect("tempdir");
    let (mut app, _) = detected(dir.path());
    assert_eq!(app.progress(JobKind::RoiDetection), JobProgress::Done);
    assert!(app.session().has_rois());

    app.dispatch(Intent::SwitchMode(Mode::RoiFiltering))
        .expect("filtering");
    app.dispatch(Intent::SelectRoiAt(Point::new(4, 4)))
        .expect("select");
    let label = app.session().selection().expect("selection");
    app.dispatch(Intent::EraseSelected).expect("erase");
    assert!(app.session().roi_sets(0).expect("sets").is_removed(label));
    app.dispatch(Intent::Undo).expect("undo");
    assert!(!app.session().roi_sets(0).expect("sets").is_removed(label));
    assert_eq!(app.session().history_len(0), 1);
}

#[test]
fn masks_restrict_detection() {
    let dir = tempdir().expect("tempdir");
    let path = write_recording(dir.path(), "cells.tif");
    let mut app = AppContext::new(Params::default());
    app.dispatch(Intent::ImportVideos(vec![path])).expect("import");
    app.dispatch(Intent::SwitchMode(Mode::RoiFinding))
        .expect("finding");
    app.dispatch(Intent::DrawMask(vec![
        Point::new(0, 0),
        Point::new(0, 9),
        Point::new(9, 9),
        Point::new(9, 0),
    ]))
    .expect("mask");
    app.dispatch(Intent::ToggleJob(JobKind::RoiDetection))
        .expect("detect");
    app.wait_for_job(TIMEOUT);

    let plane = app.session().plane_rois(0).expect("plane");
    assert_eq!(plane.areas().len(), 1);
    assert_eq!(plane.label_map()[(13, 13)], 0);
}

#[test]
fn toggling_a_running_job_cancels_it() {
    let dir = tempdir().expect("tempdir");
    let path = write_recording(dir.path(), "cells.tif");
    let mut app = AppContext::new(Params::default());
    app.dispatch(Intent::ImportVideos(vec![path])).expect("import");

    app.dispatch(Intent::ToggleJob(JobKind::MotionCorrection))
        .expect("start");
    assert!(app.is_busy());
    app.dispatch(Intent::ToggleJob(JobKind::MotionCorrection))
        .expect("toggle");
    assert!(!app.is_busy());
    assert_eq!(app.progress(JobKind::MotionCorrection), JobProgress::Idle);

    std::thread::sleep(Duration::from_millis(200));
    assert!(app.pump().is_empty());
    assert!(app.session().mc_video().is_none());
}

#[test]
fn entering_roi_finding_cancels_motion_correction() {
    let dir = tempdir().expect("tempdir");
    let path = write_recording(dir.path(), "cells.tif");
    let mut app = AppContext::new(Params::default());
    app.dispatch(Intent::ImportVideos(vec![path])).expect("import");

    app.dispatch(Intent::ToggleJob(JobKind::MotionCorrection))
        .expect("start");
    assert!(app.is_busy());
    app.dispatch(Intent::SwitchMode(Mode::RoiFinding))
        .expect("finding");
    assert_eq!(app.session().mode(), Mode::RoiFinding);
    assert!(!app.is_busy());
    assert_eq!(app.progress(JobKind::MotionCorrection), JobProgress::Idle);

    std::thread::sleep(Duration::from_millis(200));
    assert!(app.pump().is_empty());
    assert!(app.session().mc_video().is_none());
}

#[test]
fn motion_correction_is_applied_and_saved() {
    let dir = tempdir().expect("tempdir");
    let path = write_recording(dir.path(), "cells.tif");
    let mut app = AppContext::new(Params::default());
    app.dispatch(Intent::ImportVideos(vec![path])).expect("import");
    app.dispatch(Intent::ToggleJob(JobKind::MotionCorrection))
        .expect("start");
    let updates = app.wait_for_job(TIMEOUT);
    assert_eq!(
        finished(&updates, JobKind::MotionCorrection),
        Some(JobProgress::Done)
    );
    assert!(app.session().mc_video().is_some());

    let target = dir.path().join("cells_mc.tif");
    app.dispatch(Intent::SaveMotionCorrectedVideo(target.clone()))
        .expect("save");
    assert!(target.exists());
}

#[test]
fn roi_archive_and_image_round_trip() {
    let dir = tempdir().expect("tempdir");
    let (mut app, _) = detected(dir.path());
    app.dispatch(Intent::SwitchMode(Mode::RoiFiltering))
        .expect("filtering");
    let saved = app.session().label_map(0).cloned().expect("labels");

    let archive = dir.path().join("rois.json");
    let image = dir.path().join("rois.png");
    app.dispatch(Intent::SaveRoiArchive(archive.clone()))
        .expect("save archive");
    app.dispatch(Intent::SaveRoiImage(image.clone()))
        .expect("save image");
    assert!(image.exists());

    app.dispatch(Intent::TranslatePlane { dy: 3, dx: 0 })
        .expect("translate");
    assert_ne!(app.session().label_map(0), Some(&saved));

    app.dispatch(Intent::LoadRoiArchive(archive)).expect("load");
    assert_eq!(app.session().mode(), Mode::RoiFiltering);
    assert_eq!(app.session().label_map(0), Some(&saved));
    assert_eq!(app.session().history_len(0), 1);
}

#[test]
fn batch_processing_writes_outputs_for_the_queue() {
    let dir = tempdir().expect("tempdir");
    let (mut app, path) = detected(dir.path());
    app.dispatch(Intent::ToggleJob(JobKind::BatchProcessing))
        .expect("batch");
    let updates = app.wait_for_job(TIMEOUT);
    assert_eq!(
        finished(&updates, JobKind::BatchProcessing),
        Some(JobProgress::Done)
    );

    let summary = app.last_batch().expect("summary");
    assert_eq!(summary.processed.len(), 1);
    assert!(summary.skipped.is_empty());
    let outputs = PlaneOutputs::new(&output_dir_for(&path), 0);
    assert!(outputs.rois.exists());
    assert!(outputs.traces.exists());
    assert!(outputs.centroids.exists());
}
