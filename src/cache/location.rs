//! Paths of the shared root cache

use crate::cache::compression::Compression;
use crate::config::Config;
use crate::error::{RootCacheError, RootCacheResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Archive base name; the compression suffix is appended
pub const ARCHIVE_BASENAME: &str = "cache.tar";
/// Companion log of the last rebuild's install output
pub const LOG_FILENAME: &str = "cache.log";
/// Dedicated lock target
pub const LOCK_FILENAME: &str = "rootcache.lock";

/// Where one build root's cache lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLocation {
    dir: PathBuf,
    archive: PathBuf,
}

impl CacheLocation {
    /// Location in `dir` with the given archive suffix (e.g. `.gz`, or empty)
    pub fn new(dir: PathBuf, extension: &str) -> Self {
        let archive = dir.join(format!("{}{}", ARCHIVE_BASENAME, extension));
        Self { dir, archive }
    }

    /// Resolve the `dir` template and archive suffix from configuration
    ///
    /// `{root}` in the template is replaced by the build root name. The
    /// configured extension wins over the compression's default; no suffix
    /// is used without compression.
    pub fn from_config(config: &Config, compression: Compression) -> Self {
        let dir = PathBuf::from(config.root_cache.dir.replace("{root}", &config.build.root));
        let extension = match (compression, &config.root_cache.extension) {
            (Compression::None, _) => "",
            (_, Some(ext)) => ext.as_str(),
            (compression, None) => compression.extension(),
        };
        Self::new(dir, extension)
    }

    /// Create the shared cache directory if absent
    pub fn ensure_dir(&self) -> RootCacheResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            RootCacheError::io(format!("creating cache directory {}", self.dir.display()), e)
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn log(&self) -> PathBuf {
        self.dir.join(LOG_FILENAME)
    }

    pub fn lock(&self) -> PathBuf {
        self.dir.join(LOCK_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_and_default_extension() {
        let mut config = Config::default();
        config.build.root = "fedora-40-x86_64".to_string();

        let location = CacheLocation::from_config(&config, Compression::Pigz);

        assert_eq!(
            location.archive(),
            Path::new("/var/cache/rootcache/fedora-40-x86_64/root_cache/cache.tar.gz")
        );
        assert_eq!(
            location.lock(),
            PathBuf::from("/var/cache/rootcache/fedora-40-x86_64/root_cache/rootcache.lock")
        );
        assert_eq!(location.log().file_name().unwrap(), "cache.log");
    }

    #[test]
    fn configured_extension_overrides_default() {
        let mut config = Config::default();
        config.root_cache.extension = Some(".tgz".to_string());

        let location = CacheLocation::from_config(&config, Compression::Gzip);
        assert!(location.archive().ends_with("cache.tar.tgz"));
    }

    #[test]
    fn no_compression_has_no_suffix() {
        let mut config = Config::default();
        config.root_cache.extension = Some(".gz".to_string());

        let location = CacheLocation::from_config(&config, Compression::None);
        assert!(location.archive().ends_with("cache.tar"));
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let temp = tempfile::TempDir::new().unwrap();
        let location = CacheLocation::new(temp.path().join("a").join("b"), "");

        location.ensure_dir().unwrap();
        location.ensure_dir().unwrap();
        assert!(location.dir().is_dir());
    }
}
