//! Hook command - run the root cache for one lifecycle event

use crate::cli::args::HookArgs;
use crate::config::Config;
use crate::error::RootCacheResult;
use crate::lifecycle::{DirectoryTree, HookOutcome, ProcMounts, RootCacheController};
use crate::ui::{TaskSpinner, UiContext};
use console::style;
use std::fs;
use tracing::{debug, warn};

/// Execute the hook command
pub fn execute(args: HookArgs, config: &Config) -> RootCacheResult<()> {
    let ctx = UiContext::detect();

    let install_output = match &args.install_log {
        Some(path) => fs::read_to_string(path).unwrap_or_else(|e| {
            warn!("Cannot read install log {}: {}", path.display(), e);
            String::new()
        }),
        None => String::new(),
    };

    let mut tree = DirectoryTree::new(args.root.clone(), args.initialized)
        .with_install_output(install_output);
    let mounts = ProcMounts::new(args.root);

    let mut controller =
        RootCacheController::from_config(config, Box::new(TaskSpinner::new(&ctx)))?;
    let outcome = controller.handle(args.event, &mut tree, &mounts)?;
    debug!("{} finished: {:?}", args.event, outcome);

    if outcome == HookOutcome::Unpacked && tree.served_from_cache() {
        println!("{}", style("served from cache").green());
    }
    Ok(())
}
