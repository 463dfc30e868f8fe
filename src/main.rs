//! rootcache - Shared archive cache for chroot build roots
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use rootcache::cli::{Cli, Commands};
use rootcache::config::ConfigManager;
use rootcache::error::RootCacheResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> RootCacheResult<()> {
    let cli = Cli::parse();

    // 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("rootcache=warn"),
        1 => EnvFilter::new("rootcache=info"),
        _ => EnvFilter::new("rootcache=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let manager = match cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };
    let config = manager.load()?;

    match cli.command {
        Commands::Hook(args) => rootcache::cli::commands::hook(args, &config),
        Commands::Status(args) => rootcache::cli::commands::status(args, &config),
        Commands::Config(args) => rootcache::cli::commands::config(args, &config, &manager),
    }
}
