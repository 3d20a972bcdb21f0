use std::cell::Cell;
use std::fmt;
use std::sync::mpsc::Sender;

use super::controller::JobOutput;
use super::{CancellationToken, JobError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    MotionCorrection,
    RoiDetection,
    BatchProcessing,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::MotionCorrection,
        JobKind::RoiDetection,
        JobKind::BatchProcessing,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            JobKind::MotionCorrection => 0,
            JobKind::RoiDetection => 1,
            JobKind::BatchProcessing => 2,
        }
    }

    pub(crate) fn thread_name(self) -> &'static str {
        match self {
            JobKind::MotionCorrection => "motion-correction",
            JobKind::RoiDetection => "roi-detection",
            JobKind::BatchProcessing => "batch-processing",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.thread_name())
    }
}

/// Monotonic sequence number assigned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub(crate) u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// User-visible indicator for one job kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobProgress {
    #[default]
    Idle,
    Running(u8),
    Done,
    Failed,
}

#[derive(Debug)]
pub enum JobOutcome {
    Completed(JobOutput),
    Cancelled,
    Failed(JobError),
}

#[derive(Debug)]
pub enum JobEvent {
    Progress { id: JobId, kind: JobKind, percent: u8 },
    Finished { id: JobId, kind: JobKind, outcome: JobOutcome },
}

impl JobEvent {
    pub fn id(&self) -> JobId {
        match self {
            JobEvent::Progress { id, .. } | JobEvent::Finished { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobEvent::Progress { kind, .. } | JobEvent::Finished { kind, .. } => *kind,
        }
    }
}

/// Worker-side handle for checkpoints and progress reports.
pub struct JobContext {
    id: JobId,
    kind: JobKind,
    token: CancellationToken,
    sender: Sender<JobEvent>,
    last_percent: Cell<u8>,
}

impl JobContext {
    pub(crate) fn new(
        id: JobId,
        kind: JobKind,
        token: CancellationToken,
        sender: Sender<JobEvent>,
    ) -> Self {
        Self {
            id,
            kind,
            token,
            sender,
            last_percent: Cell::new(0),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn checkpoint(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        Ok(())
    }

    /// Reports `fraction` of the job as done. Percentages never go backwards.
    pub fn report(&self, fraction: f32) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).floor() as u8;
        if percent <= self.last_percent.get() {
            return;
        }
        self.last_percent.set(percent);
        // The controller may already be gone during shutdown.
        let _ = self.sender.send(JobEvent::Progress {
            id: self.id,
            kind: self.kind,
            percent,
        });
    }

    pub(crate) fn finish(&self, outcome: JobOutcome) {
        let _ = self.sender.send(JobEvent::Finished {
            id: self.id,
            kind: self.kind,
            outcome,
        });
    }
}
