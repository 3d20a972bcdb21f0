mod context;
mod error;
mod intent;

#[cfg(test)]
mod tests;

pub use context::{AppContext, JobUpdate};
pub use error::{AppError, Result};
pub use intent::Intent;
