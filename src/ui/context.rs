//! Detects whether progress can be drawn as a live spinner

use std::io::IsTerminal;

/// Environment variables that mark a CI or batch build host
const BATCH_ENV_VARS: &[&str] = &["CI", "ROOTCACHE_PLAIN", "JENKINS_URL", "BUILDKITE", "GITLAB_CI"];

/// How progress is shown to the user
#[derive(Debug, Clone)]
pub struct UiContext {
    /// Whether stderr is an interactive terminal outside of CI
    interactive: bool,
}

impl UiContext {
    /// Inspect stderr and the environment
    pub fn detect() -> Self {
        let interactive = std::io::stderr().is_terminal()
            && !BATCH_ENV_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self { interactive }
    }

    /// Plain line output regardless of the terminal
    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    /// Whether live spinners may be drawn
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_context() {
        let ctx = UiContext::non_interactive();
        assert!(!ctx.use_fancy_output());
    }
}
