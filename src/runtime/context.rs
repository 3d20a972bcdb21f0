use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::algorithms::{AlgorithmProvider, DefaultAlgorithms};
use crate::formats::{
    DefaultVideoCodec, VideoReader, load_roi_archive, save_png, save_roi_archive, write_video,
};
use crate::jobs::{
    BatchProcessingJob, BatchSettings, BatchSummary, Job, JobController, JobEvent, JobKind,
    JobOutcome, JobOutput, JobProgress, MotionCorrectionJob, RoiDetectionJob,
};
use crate::model::Params;
use crate::session::{MaskEditor, Mode, RoiEditor, SessionError, SessionState};

use super::{AppError, Intent, Result};

/// Status change of one job kind, as seen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobUpdate {
    pub kind: JobKind,
    pub progress: JobProgress,
}

fn invalid(reason: &str) -> AppError {
    SessionError::InvalidOperation(reason.to_string()).into()
}

/// Owns the session and the job controller and routes intents between them.
pub struct AppContext {
    session: SessionState,
    jobs: JobController,
    provider: Arc<dyn AlgorithmProvider>,
    reader: Arc<dyn VideoReader>,
    last_batch: Option<BatchSummary>,
    last_failure: Option<String>,
}

impl AppContext {
    pub fn new(params: Params) -> Self {
        Self::with_collaborators(
            params,
            Arc::new(DefaultAlgorithms),
            Arc::new(DefaultVideoCodec),
        )
    }

    pub fn with_collaborators(
        params: Params,
        provider: Arc<dyn AlgorithmProvider>,
        reader: Arc<dyn VideoReader>,
    ) -> Self {
        Self {
            session: SessionState::new(params, Arc::clone(&provider)),
            jobs: JobController::new(),
            provider,
            reader,
            last_batch: None,
            last_failure: None,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn progress(&self, kind: JobKind) -> JobProgress {
        self.jobs.progress(kind)
    }

    pub fn is_busy(&self) -> bool {
        self.jobs.active().is_some()
    }

    /// Summary of the most recent batch run that completed.
    pub fn last_batch(&self) -> Option<&BatchSummary> {
        self.last_batch.as_ref()
    }

    /// Message of the most recent failed job.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// Applies one intent. Requests that make no sense in the current state are ignored.
    pub fn dispatch(&mut self, intent: Intent) -> Result<()> {
        match self.handle(intent) {
            Err(AppError::Session(SessionError::InvalidOperation(reason))) => {
                debug!("ignored intent: {reason}");
                Ok(())
            }
            other => other,
        }
    }

    fn handle(&mut self, intent: Intent) -> Result<()> {
        match intent {
            Intent::ImportVideos(paths) => self.import(paths),
            Intent::RemoveQueued(index) => self.remove_queued(index),
            Intent::SwitchMode(mode) => {
                // Detection reads the video a running correction would replace.
                if mode == Mode::RoiFinding {
                    self.jobs.cancel(JobKind::MotionCorrection);
                }
                Ok(self.session.set_mode(mode)?)
            }
            Intent::SwitchPlane(z) => Ok(self.session.set_plane(z)?),
            Intent::ToggleJob(kind) => self.toggle_job(kind),
            Intent::CancelJob(kind) => {
                self.jobs.cancel(kind);
                Ok(())
            }

            Intent::SelectRoiAt(point) => {
                self.editor()?.select_at(point);
                Ok(())
            }
            Intent::SelectRoi(label) => Ok(self.editor()?.select(label)?),
            Intent::ClearSelection => {
                self.editor()?.clear_selection();
                Ok(())
            }
            Intent::EraseSelected => {
                self.editor()?.erase_selected();
                Ok(())
            }
            Intent::BeginErase => {
                self.editor()?.begin_erase();
                Ok(())
            }
            Intent::EraseNear { point, radius } => {
                self.editor()?.erase_near(point, radius);
                Ok(())
            }
            Intent::EndErase => {
                self.editor()?.end_erase();
                Ok(())
            }
            Intent::Enlarge => {
                self.editor()?.enlarge();
                Ok(())
            }
            Intent::Shrink => {
                self.editor()?.shrink();
                Ok(())
            }
            Intent::ToggleLock => {
                self.editor()?.toggle_lock();
                Ok(())
            }
            Intent::CreateRoi(shape) => {
                self.editor()?.create_roi(shape)?;
                Ok(())
            }
            Intent::TranslatePlane { dy, dx } => {
                self.editor()?.translate(dy, dx);
                Ok(())
            }
            Intent::Refilter => {
                self.editor()?.apply_filter();
                Ok(())
            }
            Intent::Undo => {
                self.editor()?.undo();
                Ok(())
            }
            Intent::ResetPlane => {
                self.editor()?.reset_plane();
                Ok(())
            }

            Intent::DrawMask(vertices) => {
                self.mask_editor()?.draw_polygon(&vertices)?;
                Ok(())
            }
            Intent::SelectMaskAt(point) => {
                self.mask_editor()?.select_at(point);
                Ok(())
            }
            Intent::EraseSelectedMask => {
                self.mask_editor()?.erase_selected();
                Ok(())
            }

            Intent::SetConfig(value) => Ok(self.session.set_config(value)?),
            Intent::SaveRoiArchive(path) => self.save_archive(&path),
            Intent::LoadRoiArchive(path) => self.load_archive(&path),
            Intent::SaveRoiImage(path) => {
                let rendered = self
                    .session
                    .rendered()
                    .ok_or_else(|| invalid("there is no ROI image to save"))?;
                save_png(&path, rendered)?;
                info!("saved ROI image to {}", path.display());
                Ok(())
            }
            Intent::SaveMotionCorrectedVideo(path) => {
                let video = self
                    .session
                    .mc_video()
                    .ok_or_else(|| invalid("no motion corrected video yet"))?;
                write_video(&path, video)?;
                info!("saved motion corrected video to {}", path.display());
                Ok(())
            }
        }
    }

    fn editor(&mut self) -> Result<RoiEditor<'_>> {
        self.session
            .editor()
            .ok_or_else(|| invalid("ROI editing needs detected ROIs and the filtering mode"))
    }

    fn mask_editor(&mut self) -> Result<MaskEditor<'_>> {
        self.session
            .mask_editor()
            .ok_or_else(|| invalid("masks are drawn while finding ROIs"))
    }

    fn open(&mut self, path: &Path) -> Result<()> {
        let video = self.reader.read(path)?.with_source(path);
        info!(
            "opened {} ({} frames, {} planes, {:?})",
            path.display(),
            video.frames(),
            video.planes(),
            video.frame_shape()
        );
        self.session.open_video(video);
        Ok(())
    }

    fn supported(&self, path: &Path) -> bool {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let supported = self.reader.supports_extension(&extension);
        if !supported {
            warn!("not queueing {}: unsupported format", path.display());
        }
        supported
    }

    fn import(&mut self, paths: Vec<PathBuf>) -> Result<()> {
        let paths = paths
            .into_iter()
            .filter(|path| self.supported(path))
            .collect::<Vec<_>>();
        let first = paths
            .first()
            .cloned()
            .ok_or_else(|| invalid("no videos to import"))?;
        self.jobs.cancel_all();
        self.open(&first)?;
        self.session.set_queue(paths);
        Ok(())
    }

    fn remove_queued(&mut self, index: usize) -> Result<()> {
        self.jobs.cancel_all();
        if !self.session.remove_queued(index)? {
            return Ok(());
        }
        match self.session.queue().first().cloned() {
            Some(next) => self.open(&next),
            None => {
                info!("video queue is empty");
                self.session.close_video();
                Ok(())
            }
        }
    }

    fn toggle_job(&mut self, kind: JobKind) -> Result<()> {
        if self.jobs.is_running(kind) {
            self.jobs.cancel(kind);
            return Ok(());
        }
        let job: Box<dyn Job> = match kind {
            JobKind::MotionCorrection => {
                let (video, selection) = self.session.motion_correction_request()?;
                Box::new(MotionCorrectionJob::new(
                    video,
                    selection,
                    self.session.params().motion_correction(),
                    Arc::clone(&self.provider),
                ))
            }
            JobKind::RoiDetection => {
                let (inputs, used_mc_video) = self.session.detection_inputs()?;
                Box::new(RoiDetectionJob::new(
                    inputs,
                    self.session.detection_settings(),
                    used_mc_video,
                    Arc::clone(&self.provider),
                ))
            }
            JobKind::BatchProcessing => {
                let paths = self.session.queue().to_vec();
                if paths.is_empty() {
                    return Err(invalid("the video queue is empty"));
                }
                let label_maps = self.session.export_label_maps();
                if label_maps.is_empty() {
                    return Err(invalid("detect ROIs before processing videos"));
                }
                let params = self.session.params();
                Box::new(BatchProcessingJob::new(
                    paths,
                    label_maps,
                    BatchSettings {
                        motion_correct: params.motion_correct_all_videos,
                        apply_blur: params.apply_blur,
                        motion_correction: params.motion_correction(),
                    },
                    Arc::clone(&self.reader),
                    Arc::clone(&self.provider),
                ))
            }
        };
        self.jobs.start(job)?;
        Ok(())
    }

    fn save_archive(&self, path: &Path) -> Result<()> {
        let archive = self
            .session
            .roi_archive()
            .ok_or_else(|| invalid("there are no ROIs to save"))?;
        save_roi_archive(path, &archive)?;
        info!("saved ROIs to {}", path.display());
        Ok(())
    }

    fn load_archive(&mut self, path: &Path) -> Result<()> {
        self.jobs.cancel(JobKind::MotionCorrection);
        self.jobs.cancel(JobKind::RoiDetection);
        let archive = load_roi_archive(path)?;
        self.session.load_roi_archive(&archive)?;
        info!("loaded ROIs from {}", path.display());
        Ok(())
    }

    /// Applies every pending job event to the session without blocking.
    pub fn pump(&mut self) -> Vec<JobUpdate> {
        let events = self.jobs.poll();
        self.apply_events(events)
    }

    /// Pumps events until no job is active or `timeout` elapses.
    pub fn wait_for_job(&mut self, timeout: Duration) -> Vec<JobUpdate> {
        let deadline = Instant::now() + timeout;
        let mut updates = self.pump();
        while self.is_busy() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let events = self.jobs.wait(remaining);
            updates.extend(self.apply_events(events));
        }
        updates
    }

    fn apply_events(&mut self, events: Vec<JobEvent>) -> Vec<JobUpdate> {
        events
            .into_iter()
            .map(|event| self.apply_event(event))
            .collect()
    }

    fn apply_event(&mut self, event: JobEvent) -> JobUpdate {
        match event {
            JobEvent::Progress { kind, percent, .. } => JobUpdate {
                kind,
                progress: JobProgress::Running(percent),
            },
            JobEvent::Finished { kind, outcome, .. } => {
                let progress = match outcome {
                    JobOutcome::Completed(output) => match self.apply_output(output) {
                        Ok(()) => JobProgress::Done,
                        Err(error) => {
                            warn!("{kind} result rejected: {error}");
                            self.jobs.mark_failed(kind);
                            self.last_failure = Some(error.to_string());
                            JobProgress::Failed
                        }
                    },
                    JobOutcome::Cancelled => JobProgress::Idle,
                    JobOutcome::Failed(error) => {
                        self.last_failure = Some(error.to_string());
                        JobProgress::Failed
                    }
                };
                JobUpdate { kind, progress }
            }
        }
    }

    fn apply_output(&mut self, output: JobOutput) -> Result<()> {
        match output {
            JobOutput::MotionCorrection(output) => self.session.apply_motion_correction(output)?,
            JobOutput::RoiDetection(output) => self.session.apply_detection(output)?,
            JobOutput::Batch(summary) => {
                info!(
                    "batch finished: {} processed, {} skipped",
                    summary.processed.len(),
                    summary.skipped.len()
                );
                self.last_batch = Some(summary);
            }
        }
        Ok(())
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.jobs.cancel_all();
    }
}
