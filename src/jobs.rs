mod batch;
mod cancel;
mod controller;
mod error;
mod motion_correction;
mod progress;
mod roi_detection;


pub use batch::{
    BatchProcessingJob, BatchSettings, BatchSummary, MAX_ALIGNMENT_SHIFT, ProcessedVideo,
};
pub use cancel::CancellationToken;
pub use controller::{Job, JobController, JobHandle, JobOutput, JobStart};
pub use error::{JobError, Result};
pub use motion_correction::{MotionCorrectionJob, MotionCorrectionOutput, PlaneSelection};
pub use progress::{JobContext, JobEvent, JobId, JobKind, JobOutcome, JobProgress};
pub use roi_detection::{
    DetectedPlane, DetectionInput, DetectionSettings, RoiDetectionJob, RoiDetectionOutput,
};
