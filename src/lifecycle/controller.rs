//! Cache decisions at each lifecycle event

use super::fs_type::archive_work_dir;
use super::tree::{BuildTree, MountTable};
use super::LifecycleEvent;
use crate::cache::{
    best_effort, ArchiveCodec, CacheLocation, CacheLock, Compression, ExclusionSet, LockMode,
    ValidityPolicy, ValidityVerdict,
};
use crate::config::Config;
use crate::error::{RootCacheError, RootCacheResult};
use crate::ui::Progress;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Progress phase while extracting the archive
pub const UNPACK_PHASE: &str = "unpacking root cache";
/// Progress phase while writing the archive
pub const PACK_PHASE: &str = "creating cache";

/// Sparse log files truncated before packing, relative to the build root
const SPARSE_LOGS: &[&str] = &["var/log/lastlog", "var/log/faillog"];

/// What a lifecycle event did to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// The archive was unpacked into the build root
    Unpacked,
    /// The build root was packed into the archive
    Packed,
    /// Nothing to do for this event
    Skipped,
}

/// Drives the root cache from lifecycle events
pub struct RootCacheController {
    location: CacheLocation,
    compression: Compression,
    exclusions: ExclusionSet,
    policy: ValidityPolicy,
    config_paths: Vec<PathBuf>,
    volatile: bool,
    cache_alterations: bool,
    lock: Option<CacheLock>,
    progress: Box<dyn Progress>,
}

impl RootCacheController {
    /// Build a controller from configuration
    ///
    /// The compression program is probed here and may fall back to an
    /// available one.
    pub fn from_config(config: &Config, progress: Box<dyn Progress>) -> RootCacheResult<Self> {
        let compression = config.root_cache.compress_program.resolve();
        let location = CacheLocation::from_config(config, compression);
        debug!(
            "Root cache at {} ({})",
            location.archive().display(),
            compression
        );

        Ok(Self {
            location,
            compression,
            exclusions: ExclusionSet::new(&config.root_cache.exclude_dirs)?,
            policy: ValidityPolicy::from_config(&config.root_cache),
            config_paths: config.build.config_paths.clone(),
            volatile: config.build.tmpfs,
            cache_alterations: config.build.cache_alterations,
            lock: None,
            progress,
        })
    }

    pub fn location(&self) -> &CacheLocation {
        &self.location
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Current verdict on the archive, computed fresh
    pub fn verdict(&self) -> ValidityVerdict {
        self.policy.check(self.location.archive(), &self.config_paths)
    }

    /// React to one lifecycle event
    pub fn handle(
        &mut self,
        event: LifecycleEvent,
        tree: &mut dyn BuildTree,
        mounts: &dyn MountTable,
    ) -> RootCacheResult<HookOutcome> {
        debug!("Root cache handling {}", event);
        match event {
            LifecycleEvent::PreInit => {
                info!("enabled root cache");
                self.unpack_root_cache(tree)
            }
            LifecycleEvent::PreShell | LifecycleEvent::PreChroot => {
                if self.volatile {
                    self.unpack_root_cache(tree)
                } else {
                    Ok(HookOutcome::Skipped)
                }
            }
            LifecycleEvent::PrePackageManager => {
                if self.volatile && (is_empty_dir(tree.root()) || self.cache_alterations) {
                    self.unpack_root_cache(tree)
                } else {
                    Ok(HookOutcome::Skipped)
                }
            }
            LifecycleEvent::PostInit => self.rebuild_root_cache(tree, mounts),
            LifecycleEvent::PostShell
            | LifecycleEvent::PostChroot
            | LifecycleEvent::PostPackageManager => {
                if self.volatile && self.cache_alterations {
                    self.rebuild_root_cache(tree, mounts)
                } else {
                    Ok(HookOutcome::Skipped)
                }
            }
        }
    }

    fn unpack_root_cache(&mut self, tree: &mut dyn BuildTree) -> RootCacheResult<HookOutcome> {
        self.open_lock()?;

        let verdict = self.verdict();
        if verdict.is_stale() {
            self.evict_stale_archive()?;
        }

        let archive = self.location.archive();
        if !archive.exists() {
            debug!("No root cache at {}", archive.display());
            return Ok(HookOutcome::Skipped);
        }
        // A reused tree is already good unless tmpfs may have discarded it
        if tree.was_initialized() && !self.volatile {
            debug!("Build root already initialized; not unpacking root cache");
            return Ok(HookOutcome::Skipped);
        }

        self.progress.start(UNPACK_PHASE);
        let result = self.unpack_locked(tree.root());
        self.progress.finish(UNPACK_PHASE);
        if !result? {
            return Ok(HookOutcome::Skipped);
        }

        tree.mark_served_from_cache();
        Ok(HookOutcome::Unpacked)
    }

    /// Remove a stale archive under the exclusive lock
    ///
    /// The verdict is re-checked once the lock is held since another builder
    /// may have rebuilt the archive meanwhile.
    fn evict_stale_archive(&self) -> RootCacheResult<()> {
        let lock = self.lock()?;
        let _guard = lock.acquire(LockMode::Exclusive, &*self.progress)?;

        match self.verdict() {
            ValidityVerdict::StaleByAge => info!("root cache aged out! cache will be rebuilt"),
            ValidityVerdict::StaleByConfig => {
                info!("configuration newer than root cache; cache will be rebuilt")
            }
            ValidityVerdict::Fresh | ValidityVerdict::Missing => return Ok(()),
        }
        best_effort::remove_file(self.location.archive());
        Ok(())
    }

    /// Unpack under the shared lock; `false` if the archive vanished while waiting
    fn unpack_locked(&self, root: &Path) -> RootCacheResult<bool> {
        let lock = self.lock()?;
        let _guard = lock.acquire(LockMode::Shared, &*self.progress)?;

        let archive = self.location.archive();
        if !archive.exists() {
            info!("Root cache {} was removed while waiting for the lock", archive.display());
            return Ok(false);
        }

        self.codec().unpack(self.location.archive(), root)?;
        for dir in self.exclusions.directories() {
            let path = root.join(&dir);
            fs::create_dir_all(&path)
                .map_err(|e| RootCacheError::io(format!("creating {}", path.display()), e))?;
        }
        Ok(true)
    }

    fn rebuild_root_cache(
        &mut self,
        tree: &mut dyn BuildTree,
        mounts: &dyn MountTable,
    ) -> RootCacheResult<HookOutcome> {
        self.open_lock()?;
        let lock = self.lock()?;
        let _guard = lock.acquire(LockMode::Exclusive, &*self.progress)?;

        tree.purge_package_db();
        for log in SPARSE_LOGS {
            best_effort::truncate_file(&tree.root().join(log));
        }

        // Only a clean initialization, or explicitly accepted alterations, may be cached
        if tree.was_initialized() && !self.cache_alterations {
            debug!("Build root was not freshly initialized; keeping existing root cache");
            return Ok(HookOutcome::Skipped);
        }

        flush_filesystems();
        let exclusions = self.exclusions.with_mount_points(&mounts.mount_points()?)?;
        debug!(
            "Excluding {}",
            exclusions.patterns().collect::<Vec<_>>().join(" ")
        );

        self.progress.start(PACK_PHASE);
        let packed = self
            .codec()
            .pack(tree.root(), self.location.archive(), &exclusions, true);
        self.progress.finish(PACK_PHASE);
        packed?;

        if !best_effort::write_file(&self.location.log(), tree.install_output()) {
            debug!("Root cache log not written");
        }
        Ok(HookOutcome::Packed)
    }

    /// Create the cache directory and open the lock file on first use
    fn open_lock(&mut self) -> RootCacheResult<()> {
        if self.lock.is_none() {
            self.location.ensure_dir()?;
            self.lock = Some(CacheLock::open(&self.location.lock())?);
        }
        Ok(())
    }

    fn lock(&self) -> RootCacheResult<&CacheLock> {
        self.lock
            .as_ref()
            .ok_or_else(|| RootCacheError::Internal("root cache lock not opened".to_string()))
    }

    fn codec(&self) -> ArchiveCodec {
        ArchiveCodec::new(self.compression).with_work_dir(archive_work_dir())
    }
}

/// Missing or unreadable directories count as empty
fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

fn flush_filesystems() {
    // SAFETY: sync has no preconditions and cannot fail.
    unsafe { libc::sync() };
}
