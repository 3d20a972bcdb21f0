use super::{Result, SessionError};

/// Interaction mode of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    MotionCorrecting,
    RoiFinding,
    RoiFiltering,
}

/// Facts a transition depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionGuard {
    pub has_video: bool,
    pub has_rois: bool,
}

impl Mode {
    /// Validates a user-requested switch from `self` to `to`.
    pub fn transition(self, to: Mode, guard: TransitionGuard) -> Result<Mode> {
        use Mode::*;

        if self == to {
            return Ok(to);
        }
        if !guard.has_video {
            return Err(SessionError::NoVideo);
        }
        match (self, to) {
            (MotionCorrecting, RoiFinding) | (RoiFiltering, RoiFinding) => Ok(to),
            (RoiFinding, MotionCorrecting) | (RoiFiltering, MotionCorrecting) => Ok(to),
            (MotionCorrecting, RoiFiltering) | (RoiFinding, RoiFiltering) => {
                if guard.has_rois {
                    Ok(to)
                } else {
                    Err(SessionError::InvalidOperation(
                        "no ROIs have been detected yet".into(),
                    ))
                }
            }
            (from, to) => Err(SessionError::InvalidTransition { from, to }),
        }
    }

    pub fn is_roi_mode(self) -> bool {
        matches!(self, Mode::RoiFinding | Mode::RoiFiltering)
    }
}
