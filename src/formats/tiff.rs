use std::fs::File;
use std::path::Path;

use ndarray::{Array, IxDyn};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Tag;

use crate::model::{LabelMap, Video};

use super::{FormatError, Result};

/// Page grouping recovered from an ImageJ hyperstack description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StackLayout {
    planes: usize,
}

fn parse_imagej_description(description: &str) -> Option<StackLayout> {
    if !description.starts_with("ImageJ=") {
        return None;
    }
    let planes = description
        .lines()
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == "slices")
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())?;
    Some(StackLayout { planes })
}

fn imagej_description(frames: usize, planes: usize) -> String {
    format!(
        "ImageJ=1.11a\nimages={}\nslices={planes}\nframes={frames}\nhyperstack=true\n",
        frames * planes
    )
}

/// Reads a TIFF stack as a video.
///
/// Pages of an ImageJ hyperstack are grouped as (time, plane); any other multi-page file is
/// one plane over time. A single page is a 2-D image and is rejected by `Video::from_dyn`.
pub(crate) fn read_video_tiff(path: &Path) -> Result<Video> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(file)?;
    let (width, height) = decoder.dimensions()?;
    let layout = decoder
        .get_tag_ascii_string(Tag::ImageDescription)
        .ok()
        .and_then(|description| parse_imagej_description(&description));
    let mut samples = Vec::new();
    let mut pages = 0usize;

    loop {
        samples.extend(decode_page(&mut decoder, width, height)?);
        pages += 1;
        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
        let (other_width, other_height) = decoder.dimensions()?;
        if other_width != width || other_height != height {
            return Err(FormatError::UnsupportedLayout(
                "TIFF pages must have identical dimensions".into(),
            ));
        }
    }

    let (height, width) = (height as usize, width as usize);
    let shape = match layout {
        _ if pages == 1 => vec![height, width],
        Some(StackLayout { planes }) if planes > 1 && pages % planes == 0 => {
            vec![pages / planes, planes, height, width]
        }
        _ => vec![pages, height, width],
    };
    let data = Array::from_shape_vec(IxDyn(&shape), samples)
        .map_err(|error| FormatError::UnsupportedLayout(error.to_string()))?;
    Ok(Video::from_dyn(data)?.with_source(path))
}

fn decode_page(decoder: &mut Decoder<File>, width: u32, height: u32) -> Result<Vec<f32>> {
    let values = match decoder.read_image()? {
        DecodingResult::U8(buffer) => buffer.into_iter().map(f32::from).collect::<Vec<_>>(),
        DecodingResult::U16(buffer) => buffer.into_iter().map(f32::from).collect(),
        DecodingResult::U32(buffer) => buffer.into_iter().map(|value| value as f32).collect(),
        DecodingResult::I8(buffer) => buffer.into_iter().map(f32::from).collect(),
        DecodingResult::I16(buffer) => buffer.into_iter().map(f32::from).collect(),
        DecodingResult::I32(buffer) => buffer.into_iter().map(|value| value as f32).collect(),
        DecodingResult::F32(buffer) => buffer,
        DecodingResult::F64(buffer) => buffer.into_iter().map(|value| value as f32).collect(),
        other => {
            return Err(FormatError::UnsupportedLayout(format!(
                "unsupported TIFF sample type: {other:?}"
            )));
        }
    };
    if values.len() != width as usize * height as usize {
        return Err(FormatError::UnsupportedLayout(
            "TIFF RGB/alpha pages are not supported for videos".into(),
        ));
    }
    Ok(values)
}

/// Writes every (time, plane) frame as a float page with an ImageJ hyperstack description.
pub(crate) fn write_video_tiff(path: &Path, video: &Video) -> Result<()> {
    let (height, width) = video.frame_shape();
    let description = imagej_description(video.frames(), video.planes());
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(file)?;

    for t in 0..video.frames() {
        for z in 0..video.planes() {
            let page = video.frame(t, z).iter().copied().collect::<Vec<_>>();
            let mut image =
                encoder.new_image::<colortype::Gray32Float>(width as u32, height as u32)?;
            image
                .encoder()
                .write_tag(Tag::ImageDescription, description.as_str())?;
            image.write_data(&page)?;
        }
    }
    Ok(())
}

/// Writes a label map as a single 32-bit unsigned page.
pub(crate) fn write_label_map_tiff(path: &Path, labels: &LabelMap) -> Result<()> {
    let (height, width) = labels.dim();
    let page = labels.iter().copied().collect::<Vec<_>>();
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(file)?;
    encoder.write_image::<colortype::Gray32>(width as u32, height as u32, &page)?;
    Ok(())
}

pub(crate) fn read_label_map_tiff(path: &Path) -> Result<LabelMap> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(file)?;
    let (width, height) = decoder.dimensions()?;
    let values = match decoder.read_image()? {
        DecodingResult::U8(buffer) => buffer.into_iter().map(u32::from).collect::<Vec<_>>(),
        DecodingResult::U16(buffer) => buffer.into_iter().map(u32::from).collect(),
        DecodingResult::U32(buffer) => buffer,
        other => {
            return Err(FormatError::UnsupportedLayout(format!(
                "label maps must be unsigned integers, found {other:?}"
            )));
        }
    };
    LabelMap::from_shape_vec((height as usize, width as usize), values)
        .map_err(|error| FormatError::UnsupportedLayout(error.to_string()))
}
