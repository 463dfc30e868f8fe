//! Collaborators the controller needs from the orchestrator
//!
//! [`BuildTree`] and [`MountTable`] are owned by the orchestrator; the
//! directory- and `/proc`-backed implementations here serve the binary.

use crate::cache::best_effort;
use crate::error::{RootCacheError, RootCacheResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Package manager database directory, relative to the build root
const RPM_DB_DIR: &str = "var/lib/rpm";

/// A build root as seen by the cache
pub trait BuildTree {
    /// Root directory of the tree; pack source and unpack destination
    fn root(&self) -> &Path;

    /// Whether the tree was already populated before this invocation
    ///
    /// A tree that was not initialized gets unpacked into and is trusted
    /// to be cached after its clean initialization.
    fn was_initialized(&self) -> bool;

    /// Drop package manager transient database files (best effort)
    fn purge_package_db(&mut self);

    /// Captured output of the package manager's base install
    fn install_output(&self) -> &str;

    /// Record that the tree was populated from the cache
    fn mark_served_from_cache(&mut self);
}

/// Source of active mount points
pub trait MountTable {
    /// Mount points inside the build root, as absolute in-tree paths (`/proc`)
    fn mount_points(&self) -> RootCacheResult<Vec<PathBuf>>;
}

/// Build root backed by a plain directory
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    root: PathBuf,
    initialized: bool,
    install_output: String,
    served_from_cache: bool,
}

impl DirectoryTree {
    pub fn new(root: PathBuf, initialized: bool) -> Self {
        Self {
            root,
            initialized,
            install_output: String::new(),
            served_from_cache: false,
        }
    }

    /// Set the install output recorded in `cache.log` on rebuild
    pub fn with_install_output(mut self, output: String) -> Self {
        self.install_output = output;
        self
    }

    /// Whether the last unpack populated this tree
    pub fn served_from_cache(&self) -> bool {
        self.served_from_cache
    }
}

impl BuildTree for DirectoryTree {
    fn root(&self) -> &Path {
        &self.root
    }

    fn was_initialized(&self) -> bool {
        self.initialized
    }

    fn purge_package_db(&mut self) {
        let db_dir = self.root.join(RPM_DB_DIR);
        let Ok(entries) = fs::read_dir(&db_dir) else {
            return;
        };
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().starts_with("__db.") {
                debug!("Removing {}", entry.path().display());
                best_effort::remove_file(&entry.path());
            }
        }
    }

    fn install_output(&self) -> &str {
        &self.install_output
    }

    fn mark_served_from_cache(&mut self) {
        self.served_from_cache = true;
    }
}

/// Mount table read from `/proc/self/mounts`
#[derive(Debug, Clone)]
pub struct ProcMounts {
    table: PathBuf,
    root: PathBuf,
}

impl ProcMounts {
    /// Mounts below `root` from the running system
    pub fn new(root: PathBuf) -> Self {
        Self::with_table(PathBuf::from("/proc/self/mounts"), root)
    }

    /// Mounts below `root` from a mounts-format file
    pub fn with_table(table: PathBuf, root: PathBuf) -> Self {
        Self { table, root }
    }
}

impl MountTable for ProcMounts {
    fn mount_points(&self) -> RootCacheResult<Vec<PathBuf>> {
        let content = fs::read_to_string(&self.table).map_err(|e| {
            RootCacheError::io(format!("reading mount table {}", self.table.display()), e)
        })?;
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());

        let mut mounts = Vec::new();
        for line in content.lines() {
            let Some(target) = line.split_whitespace().nth(1) else {
                continue;
            };
            let target = PathBuf::from(decode_mount_path(target));
            if let Ok(rel) = target.strip_prefix(&root) {
                if !rel.as_os_str().is_empty() {
                    mounts.push(Path::new("/").join(rel));
                }
            }
        }
        debug!("{} mount points under {}", mounts.len(), root.display());
        Ok(mounts)
    }
}

/// Decode the octal escapes (`\040` for space) used in mount tables
fn decode_mount_path(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if let Some(code) = raw
                .get(i + 1..i + 4)
                .and_then(|digits| u8::from_str_radix(digits, 8).ok())
            {
                out.push(code);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
