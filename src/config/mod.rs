//! Configuration management for rootcache

pub mod schema;

pub use schema::Config;

use crate::error::{RootCacheError, RootCacheResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Locates and loads the configuration file
pub struct ConfigManager {
    config_path: PathBuf,
    explicit: bool,
}

impl ConfigManager {
    /// Manager for the per-user config file
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            explicit: false,
        }
    }

    /// Create a config manager with a custom path (which must exist)
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            explicit: true,
        }
    }

    /// `~/.config/rootcache/config.toml` on Linux
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rootcache")
            .join("config.toml")
    }

    /// Load configuration, falling back to defaults if the default file is absent
    ///
    /// The loaded file is appended to `build.config_paths` so that editing it
    /// invalidates the cache.
    pub fn load(&self) -> RootCacheResult<Config> {
        if !self.config_path.exists() {
            if self.explicit {
                return Err(RootCacheError::ConfigNotFound(self.config_path.clone()));
            }
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        let mut config = self.load_from_file(&self.config_path)?;
        if !config.build.config_paths.contains(&self.config_path) {
            config.build.config_paths.push(self.config_path.clone());
        }
        Ok(config)
    }

    /// Parse one TOML file
    pub fn load_from_file(&self, path: &Path) -> RootCacheResult<Config> {
        let content = fs::read_to_string(path)
            .map_err(|e| RootCacheError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| RootCacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Path this manager reads
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
