mod editing;
mod error;
mod history;
mod masks;
mod mode;
mod render;
mod state;

#[cfg(test)]
mod tests;

pub use editing::{RoiEditor, RoiShape};
pub use error::{Result, SessionError};
pub use history::{EditStore, HISTORY_CAPACITY, HistorySnapshot};
pub use masks::{MaskEditor, PlaneMasks, UserMask};
pub use mode::{Mode, TransitionGuard};
pub use render::{label_color, overlay, render};
pub use state::{PlaneRois, SessionState};
