use std::path::PathBuf;

use crate::jobs::JobKind;
use crate::model::{ConfigValue, Point};
use crate::session::{Mode, RoiShape};

/// Everything the presentation layer can ask of the core.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Replaces the queue; only the first video is opened.
    ImportVideos(Vec<PathBuf>),
    RemoveQueued(usize),
    SwitchMode(Mode),
    SwitchPlane(usize),
    /// Starts the job, or cancels it when it is already running.
    ToggleJob(JobKind),
    CancelJob(JobKind),

    SelectRoiAt(Point),
    SelectRoi(u32),
    ClearSelection,
    EraseSelected,
    BeginErase,
    EraseNear { point: Point, radius: f32 },
    EndErase,
    Enlarge,
    Shrink,
    ToggleLock,
    CreateRoi(RoiShape),
    TranslatePlane { dy: i32, dx: i32 },
    Refilter,
    Undo,
    ResetPlane,

    DrawMask(Vec<Point>),
    SelectMaskAt(Point),
    EraseSelectedMask,

    SetConfig(ConfigValue),
    SaveRoiArchive(PathBuf),
    LoadRoiArchive(PathBuf),
    SaveRoiImage(PathBuf),
    SaveMotionCorrectedVideo(PathBuf),
}
