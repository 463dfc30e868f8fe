//! Config command - show the effective configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{RootCacheError, RootCacheResult};

/// Execute the config command
pub fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> RootCacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => {
            let toml = toml::to_string_pretty(config)
                .map_err(|e| RootCacheError::Internal(format!("serializing config: {}", e)))?;
            println!("{}", toml);
        }
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
    }
    Ok(())
}
