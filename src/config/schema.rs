//! Configuration schema for rootcache
//!
//! Configuration is stored at `~/.config/rootcache/config.toml`

use crate::cache::Compression;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build root settings shared with the orchestrator
    pub build: BuildConfig,

    /// Root cache settings
    pub root_cache: RootCacheConfig,
}

/// Build root settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Build root name, substituted for `{root}` in the cache dir template
    pub root: String,

    /// Configuration files whose modification invalidates the cache
    pub config_paths: Vec<PathBuf>,

    /// Build root lives on tmpfs and may vanish between lifecycle events
    pub tmpfs: bool,

    /// Persist the build root even after in-session alterations
    pub cache_alterations: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            root: "default".to_string(),
            config_paths: vec![],
            tmpfs: false,
            cache_alterations: false,
        }
    }
}

/// Root cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RootCacheConfig {
    /// Shared cache directory template (`{root}` is replaced)
    pub dir: String,

    /// Compression program for the archive
    pub compress_program: Compression,

    /// Archive suffix override (defaults to the program's own suffix)
    pub extension: Option<String>,

    /// Paths inside the build root never written to the archive
    pub exclude_dirs: Vec<String>,

    /// Expire archives older than `max_age_days`
    pub age_check: bool,

    /// Maximum archive age in days
    pub max_age_days: f64,

    /// Expire archives older than any file in `build.config_paths`
    pub config_check: bool,
}

impl Default for RootCacheConfig {
    fn default() -> Self {
        Self {
            dir: "/var/cache/rootcache/{root}/root_cache".to_string(),
            compress_program: Compression::Pigz,
            extension: None,
            exclude_dirs: vec![
                "./proc".to_string(),
                "./sys".to_string(),
                "./dev".to_string(),
                "./tmp/ccache".to_string(),
                "./var/cache/yum".to_string(),
                "./var/cache/dnf".to_string(),
            ],
            age_check: true,
            max_age_days: 15.0,
            config_check: true,
        }
    }
}
