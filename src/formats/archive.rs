use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{LabelMap, RoiSets};

use super::{FormatError, Result};

const ARCHIVE_VERSION: u32 = 1;

/// Everything needed to restore one plane's ROIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneArchive {
    pub height: usize,
    pub width: usize,
    /// Row-major label map.
    pub labels: Vec<u32>,
    pub filtered_out: BTreeSet<u32>,
    pub erased: BTreeSet<u32>,
    pub locked: BTreeSet<u32>,
    pub areas: BTreeMap<u32, f32>,
    pub circularities: BTreeMap<u32, f32>,
}

impl PlaneArchive {
    pub fn new(
        label_map: &LabelMap,
        sets: &RoiSets,
        areas: &BTreeMap<u32, f32>,
        circularities: &BTreeMap<u32, f32>,
    ) -> Self {
        let (height, width) = label_map.dim();
        Self {
            height,
            width,
            labels: label_map.iter().copied().collect(),
            filtered_out: sets.filtered_out().clone(),
            erased: sets.erased().clone(),
            locked: sets.locked().clone(),
            areas: areas.clone(),
            circularities: circularities.clone(),
        }
    }

    pub fn label_map(&self) -> Result<LabelMap> {
        LabelMap::from_shape_vec((self.height, self.width), self.labels.clone())
            .map_err(|error| FormatError::UnsupportedLayout(error.to_string()))
    }

    pub fn sets(&self) -> RoiSets {
        RoiSets::from_parts(
            self.filtered_out.clone(),
            self.erased.clone(),
            self.locked.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiArchive {
    pub version: u32,
    pub planes: Vec<PlaneArchive>,
}

impl RoiArchive {
    pub fn new(planes: Vec<PlaneArchive>) -> Self {
        Self {
            version: ARCHIVE_VERSION,
            planes,
        }
    }
}

pub fn save_roi_archive(path: impl AsRef<Path>, archive: &RoiArchive) -> Result<()> {
    let serialized = serde_json::to_string(archive)?;
    fs::write(path, serialized)?;
    Ok(())
}

pub fn load_roi_archive(path: impl AsRef<Path>) -> Result<RoiArchive> {
    let raw = fs::read_to_string(path)?;
    let archive = serde_json::from_str::<RoiArchive>(&raw)?;
    if archive.version != ARCHIVE_VERSION {
        return Err(FormatError::UnsupportedFormat(format!(
            "ROI archive version {}",
            archive.version
        )));
    }
    for plane in &archive.planes {
        if plane.labels.len() != plane.height * plane.width {
            return Err(FormatError::UnsupportedLayout(format!(
                "plane of {}x{} holds {} labels",
                plane.height,
                plane.width,
                plane.labels.len()
            )));
        }
    }
    Ok(archive)
}
