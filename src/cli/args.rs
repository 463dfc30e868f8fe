//! CLI argument definitions using clap derive

use crate::lifecycle::LifecycleEvent;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// rootcache - Shared archive cache for chroot build roots
///
/// Unpacks a cached build root instead of reinstalling base packages, and
/// rebuilds the cache after a clean initialization.
#[derive(Parser, Debug)]
#[command(name = "rootcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ROOTCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the root cache for one lifecycle event
    Hook(HookArgs),

    /// Show the cache location and whether the archive is usable
    Status(StatusArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Arguments for the hook command
#[derive(Parser, Debug)]
pub struct HookArgs {
    /// Lifecycle event that occurred
    #[arg(value_enum)]
    pub event: LifecycleEvent,

    /// Build root directory
    #[arg(short, long)]
    pub root: PathBuf,

    /// The build root was already populated before this invocation
    #[arg(long)]
    pub initialized: bool,

    /// File holding the package manager's install output, saved as cache.log
    #[arg(long)]
    pub install_log: Option<PathBuf>,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

/// Output format for status
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_hook() {
        let cli = Cli::parse_from([
            "rootcache",
            "hook",
            "post-init",
            "--root",
            "/var/lib/rootcache/fedora/root",
            "--install-log",
            "/tmp/install.log",
        ]);
        match cli.command {
            Commands::Hook(args) => {
                assert_eq!(args.event, LifecycleEvent::PostInit);
                assert_eq!(args.root, PathBuf::from("/var/lib/rootcache/fedora/root"));
                assert!(!args.initialized);
                assert_eq!(args.install_log, Some(PathBuf::from("/tmp/install.log")));
            }
            _ => panic!("expected Hook command"),
        }
    }

    #[test]
    fn cli_parses_package_manager_event() {
        let cli = Cli::parse_from([
            "rootcache",
            "hook",
            "pre-package-manager",
            "-r",
            "/root",
            "--initialized",
        ]);
        match cli.command {
            Commands::Hook(args) => {
                assert_eq!(args.event, LifecycleEvent::PrePackageManager);
                assert!(args.initialized);
            }
            _ => panic!("expected Hook command"),
        }
    }

    #[test]
    fn cli_rejects_unknown_event() {
        assert!(Cli::try_parse_from(["rootcache", "hook", "pre-build", "--root", "/r"]).is_err());
    }

    #[test]
    fn cli_parses_status_json() {
        let cli = Cli::parse_from(["rootcache", "status", "--format", "json"]);
        match cli.command {
            Commands::Status(args) => assert!(matches!(args.format, OutputFormat::Json)),
            _ => panic!("expected Status command"),
        }
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["rootcache", "status"]);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::parse_from(["rootcache", "-vv", "status"]);
        assert_eq!(cli.verbose, 2);
    }
}
