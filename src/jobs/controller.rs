use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::batch::BatchSummary;
use super::motion_correction::MotionCorrectionOutput;
use super::roi_detection::RoiDetectionOutput;
use super::{
    CancellationToken, JobContext, JobError, JobEvent, JobId, JobKind, JobOutcome, JobProgress,
    Result,
};

/// A unit of background work run on its own worker thread.
pub trait Job: Send {
    fn kind(&self) -> JobKind;
    fn run(self: Box<Self>, ctx: &JobContext) -> Result<JobOutput>;
}

#[derive(Debug)]
pub enum JobOutput {
    MotionCorrection(MotionCorrectionOutput),
    RoiDetection(RoiDetectionOutput),
    Batch(BatchSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    pub id: JobId,
    pub kind: JobKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStart {
    Started(JobHandle),
    /// The requested kind was already running and has been cancelled instead.
    Toggled(JobKind),
}

#[derive(Debug)]
struct ActiveJob {
    handle: JobHandle,
    token: CancellationToken,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Runs at most one job at a time and filters worker events down to the active job.
pub struct JobController {
    sender: Sender<JobEvent>,
    receiver: Receiver<JobEvent>,
    next_id: u64,
    active: Option<ActiveJob>,
    progress: [JobProgress; 3],
}

impl Default for JobController {
    fn default() -> Self {
        Self::new()
    }
}

impl JobController {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            next_id: 1,
            active: None,
            progress: [JobProgress::Idle; 3],
        }
    }

    pub fn start(&mut self, job: Box<dyn Job>) -> Result<JobStart> {
        let kind = job.kind();
        if let Some(active) = &self.active {
            if active.handle.kind == kind {
                info!("{kind} job {} toggled off", active.handle.id);
                self.cancel(kind);
                return Ok(JobStart::Toggled(kind));
            }
            let other = active.handle.kind;
            self.cancel(other);
        }

        let id = JobId(self.next_id);
        self.next_id += 1;
        let token = CancellationToken::new();
        let ctx = JobContext::new(id, kind, token.clone(), self.sender.clone());

        thread::Builder::new()
            .name(kind.thread_name().into())
            .spawn(move || {
                let outcome = match panic::catch_unwind(AssertUnwindSafe(|| job.run(&ctx))) {
                    Ok(Ok(output)) => JobOutcome::Completed(output),
                    Ok(Err(JobError::Cancelled)) => JobOutcome::Cancelled,
                    Ok(Err(error)) => JobOutcome::Failed(error),
                    Err(payload) => {
                        JobOutcome::Failed(JobError::Panicked(panic_message(&*payload)))
                    }
                };
                ctx.finish(outcome);
            })
            .map_err(JobError::Spawn)?;

        let handle = JobHandle { id, kind };
        info!("{kind} job {id} started");
        self.active = Some(ActiveJob { handle, token });
        self.progress[kind.index()] = JobProgress::Running(0);
        Ok(JobStart::Started(handle))
    }

    /// Cancels the active job if it is of `kind`. Returns whether anything was cancelled.
    pub fn cancel(&mut self, kind: JobKind) -> bool {
        match self.active.take() {
            Some(active) if active.handle.kind == kind => {
                active.token.cancel();
                self.progress[kind.index()] = JobProgress::Idle;
                info!("{kind} job {} cancelled", active.handle.id);
                true
            }
            other => {
                self.active = other;
                false
            }
        }
    }

    pub fn cancel_all(&mut self) {
        for kind in JobKind::ALL {
            self.cancel(kind);
        }
    }

    pub fn active(&self) -> Option<JobHandle> {
        self.active.as_ref().map(|active| active.handle)
    }

    pub fn is_running(&self, kind: JobKind) -> bool {
        self.active().is_some_and(|handle| handle.kind == kind)
    }

    pub fn progress(&self, kind: JobKind) -> JobProgress {
        self.progress[kind.index()]
    }

    /// Flags a completed job whose result the session refused.
    pub fn mark_failed(&mut self, kind: JobKind) {
        self.progress[kind.index()] = JobProgress::Failed;
    }

    /// Drains pending worker events without blocking.
    pub fn poll(&mut self) -> Vec<JobEvent> {
        let mut delivered = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            if let Some(event) = self.accept(event) {
                delivered.push(event);
            }
        }
        delivered
    }

    /// Blocks until at least one event for the active job arrives or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Vec<JobEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        let mut delivered = vec![event];
                        delivered.extend(self.poll());
                        return delivered;
                    }
                    if Instant::now() >= deadline {
                        return Vec::new();
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Vec::new(),
                // The controller holds a sender, so the channel never disconnects.
                Err(RecvTimeoutError::Disconnected) => return Vec::new(),
            }
        }
    }

    fn accept(&mut self, event: JobEvent) -> Option<JobEvent> {
        let Some(active) = &self.active else {
            debug!("dropping stale {} event from job {}", event.kind(), event.id());
            return None;
        };
        if active.handle.id != event.id() {
            debug!("dropping stale {} event from job {}", event.kind(), event.id());
            return None;
        }

        let kind = event.kind();
        match &event {
            JobEvent::Progress { percent, .. } => {
                self.progress[kind.index()] = JobProgress::Running(*percent);
            }
            JobEvent::Finished { id, outcome, .. } => {
                self.active = None;
                self.progress[kind.index()] = match outcome {
                    JobOutcome::Completed(_) => {
                        info!("{kind} job {id} completed");
                        JobProgress::Done
                    }
                    JobOutcome::Cancelled => {
                        info!("{kind} job {id} stopped after cancellation");
                        JobProgress::Idle
                    }
                    JobOutcome::Failed(error) => {
                        warn!("{kind} job {id} failed: {error}");
                        JobProgress::Failed
                    }
                };
            }
        }
        Some(event)
    }
}
