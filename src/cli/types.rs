use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(
    name = "roi-finder",
    version,
    about = "Motion correction, ROI detection and trace extraction for calcium imaging videos"
)]
pub(super) struct Cli {
    #[command(subcommand)]
    pub(super) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(super) enum Commands {
    /// Prints the shape and intensity range of a video.
    Info { input: PathBuf },
    /// Prints the effective parameters, optionally writing them to a JSON or YAML file.
    Params {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Detects ROIs in one video and writes the archive, label maps and ROI image.
    Detect {
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Motion-corrects first and detects on the corrected video.
        #[arg(long)]
        motion_correct: bool,
    },
    /// Extracts traces from every input using ROIs from the first one.
    Process {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Reuses a saved ROI archive instead of detecting on the first input.
        #[arg(long)]
        rois: Option<PathBuf>,
        #[arg(long)]
        motion_correct: bool,
        #[arg(long)]
        blur: bool,
    },
}

#[derive(Debug, Serialize)]
pub(super) struct VideoInfo {
    pub(super) path: String,
    pub(super) frames: usize,
    pub(super) planes: usize,
    pub(super) height: usize,
    pub(super) width: usize,
    pub(super) max_value: f32,
    pub(super) dynamic_range: f32,
}

#[derive(Debug, Serialize)]
pub(super) struct PlaneSummary {
    pub(super) plane: usize,
    pub(super) rois: usize,
    pub(super) removed: usize,
}
