//! Progress reporting for long-running cache phases
//!
//! The library reports phases through the [`Progress`] trait. The binary
//! uses [`TaskSpinner`], which falls back to plain lines in CI and
//! non-interactive environments.

mod context;
mod progress;

pub use context::UiContext;
pub use progress::{LogProgress, Progress, TaskSpinner};
