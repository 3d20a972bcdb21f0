use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;

use image::{Rgb, RgbImage};
use ndarray::{Array4, array};
use tempfile::tempdir;
use ::tiff::encoder::{TiffEncoder, colortype};

use super::*;
use crate::algorithms::RoiTraces;
use crate::model::{CoreError, RoiSets, Video};

fn sample_video(frames: usize, planes: usize) -> Video {
    let data = Array4::from_shape_fn((frames, planes, 3, 4), |(t, z, y, x)| {
        (t * 1000 + z * 100 + y * 10 + x) as f32
    });
    Video::new(data).expect("video")
}

#[test]
fn video_tiff_roundtrip_keeps_planes() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("stack.tif");
    let video = sample_video(3, 2);
    write_video(&path, &video).expect("write video");

    let restored = read_video(&path).expect("read video");
    assert_eq!(restored.frames(), 3);
    assert_eq!(restored.planes(), 2);
    assert_eq!(restored.data(), video.data());
    assert_eq!(restored.source(), Some(path.as_path()));
}

#[test]
fn plain_multipage_tiff_is_a_single_plane_video() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("plain.tiff");
    let file = File::create(&path).expect("create");
    let mut encoder = TiffEncoder::new(file).expect("encoder");
    for value in [10_u16, 20, 30] {
        encoder
            .write_image::<colortype::Gray16>(2, 2, &[value; 4])
            .expect("page");
    }
    drop(encoder);

    let video = read_video(&path).expect("read");
    assert_eq!(video.frames(), 3);
    assert_eq!(video.planes(), 1);
    assert_eq!(video.frame(2, 0)[(1, 1)], 30.0);
}

#[test]
fn single_page_tiff_is_rejected_as_two_dimensional() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("single.tif");
    let file = File::create(&path).expect("create");
    let mut encoder = TiffEncoder::new(file).expect("encoder");
    encoder
        .write_image::<colortype::Gray8>(2, 2, &[1, 2, 3, 4])
        .expect("page");
    drop(encoder);

    let error = read_video(&path).expect_err("2-D input");
    assert!(matches!(
        error,
        FormatError::Core(CoreError::NotEnoughDimensions { ndim: 2 })
    ));
}

#[test]
fn label_map_tiff_keeps_large_labels() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("z_0_rois.tif");
    let labels = array![[0_u32, 70_000], [3, 0]];
    write_label_map(&path, &labels).expect("write labels");
    assert_eq!(read_label_map(&path).expect("read labels"), labels);
}

#[test]
fn unsupported_extensions_error() {
    let dir = tempdir().expect("tempdir");
    let error = read_video(dir.path().join("clip.avi")).expect_err("must fail");
    assert!(error.to_string().contains("avi"));
    let image = RgbImage::new(1, 1);
    assert!(save_png(dir.path().join("rois.bmp"), &image).is_err());
}

#[test]
fn trace_and_centroid_tables() {
    let dir = tempdir().expect("tempdir");
    let traces = RoiTraces {
        labels: vec![2, 5],
        centroids: array![[1.5_f32, 2.0], [4.0, 0.5]],
        traces: array![[1.0_f32, 2.0], [3.0, 4.0], [5.0, 6.0]],
    };
    let outputs = PlaneOutputs::new(dir.path(), 0);
    write_traces_csv(&outputs.traces, &traces).expect("traces");
    write_centroids_csv(&outputs.centroids, &traces).expect("centroids");

    let mut reader = csv::Reader::from_path(&outputs.traces).expect("reader");
    let headers = reader.headers().expect("headers").clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["Frame", "ROI #2", "ROI #5"]);
    let rows = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .expect("rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[0][0], "1");
    assert_eq!(&rows[2][2], "6");

    let mut reader = csv::Reader::from_path(&outputs.centroids).expect("reader");
    let headers = reader.headers().expect("headers").clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["Label", "X", "Y"]);
    let first = reader.records().next().expect("row").expect("record");
    assert_eq!(first.iter().collect::<Vec<_>>(), vec!["2", "1.5", "2"]);
}

#[test]
fn mismatched_trace_tables_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let traces = RoiTraces {
        labels: vec![1],
        centroids: array![[0.0_f32, 0.0]],
        traces: array![[1.0_f32, 2.0]],
    };
    assert!(write_traces_csv(dir.path().join("t.csv"), &traces).is_err());
}

#[test]
fn roi_archive_restores_plane_state() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("rois.json");
    let labels = array![[1_u32, 0], [2, 2]];
    let sets = RoiSets::from_parts(
        BTreeSet::from([1]),
        BTreeSet::from([2]),
        BTreeSet::from([2]),
    );
    let areas = BTreeMap::from([(1, 1.0), (2, 2.0)]);
    let circularities = BTreeMap::from([(1, 0.7), (2, 0.5)]);
    let archive = RoiArchive::new(vec![PlaneArchive::new(&labels, &sets, &areas, &circularities)]);
    save_roi_archive(&path, &archive).expect("save");

    let restored = load_roi_archive(&path).expect("load");
    let plane = &restored.planes[0];
    assert_eq!(plane.label_map().expect("labels"), labels);
    assert_eq!(plane.sets(), sets);
    assert_eq!(plane.sets().removed(), &BTreeSet::from([1, 2]));
    assert_eq!(plane.areas, areas);
}

#[test]
fn png_roi_image_is_written() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("rois.png");
    let mut image = RgbImage::new(2, 2);
    image.put_pixel(1, 0, Rgb([255, 0, 0]));
    save_png(&path, &image).expect("save png");
    let restored = image::open(&path).expect("open").to_rgb8();
    assert_eq!(restored.get_pixel(1, 0), &Rgb([255, 0, 0]));
}

#[test]
fn output_paths_follow_video_stem() {
    let dir = output_dir_for(std::path::Path::new("/data/run/mouse1.tif"));
    assert_eq!(dir, std::path::Path::new("/data/run/mouse1"));
    let outputs = PlaneOutputs::new(&dir, 2);
    assert!(outputs.rois.ends_with("z_2_rois.tif"));
    assert!(outputs.centroids.ends_with("z_2_centroids.csv"));
}
