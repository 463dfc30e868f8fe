//! Progress indicators with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::time::Duration;
use tracing::info;

/// Receives named phases such as "unpacking root cache"
pub trait Progress {
    /// A phase began
    fn start(&self, phase: &str);

    /// A phase ended (successfully or not)
    fn finish(&self, phase: &str);
}

/// Progress reported through tracing only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn start(&self, phase: &str) {
        info!("Start: {}", phase);
    }

    fn finish(&self, phase: &str) {
        info!("Finish: {}", phase);
    }
}

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: RefCell<Option<ProgressBar>>,
    interactive: bool,
}

impl TaskSpinner {
    /// Create a new spinner (nothing is shown until a phase starts)
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: RefCell::new(None),
            interactive: ctx.use_fancy_output(),
        }
    }

    fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} {msg}  {elapsed:.dim}")
        {
            spinner.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    }
}

impl Progress for TaskSpinner {
    fn start(&self, phase: &str) {
        if self.interactive {
            let mut current = self.spinner.borrow_mut();
            if let Some(previous) = current.take() {
                previous.finish_and_clear();
            }
            *current = Some(Self::spinner(phase));
        } else {
            // Plain output for CI
            eprintln!("{} {}", style("...").dim(), phase);
        }
    }

    fn finish(&self, phase: &str) {
        if let Some(spinner) = self.spinner.borrow_mut().take() {
            spinner.finish_and_clear();
        }
        if self.interactive {
            eprintln!("{} {}", style("✓").green(), phase);
        } else {
            eprintln!("{} {}", style("[OK]").green(), phase);
        }
    }
}
