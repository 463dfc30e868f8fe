//! Shared/exclusive locking of the root cache
//!
//! Advisory `flock(2)` on a dedicated lock file next to the archive. Readers
//! (unpack) take it shared, the writer (rebuild) takes it exclusive. There is
//! no timeout: a blocked acquisition waits until the holder releases or dies,
//! and the kernel drops the lock with the holder's file descriptor.

use crate::error::{RootCacheError, RootCacheResult};
use crate::ui::Progress;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Progress phase shown while blocked on another builder
pub const WAIT_PHASE: &str = "Waiting for rootcache lock";

/// Lock acquisition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many holders; used while reading the archive
    Shared,
    /// Single holder; used while writing the archive
    Exclusive,
}

impl LockMode {
    fn operation(&self) -> libc::c_int {
        match self {
            Self::Shared => libc::LOCK_SH,
            Self::Exclusive => libc::LOCK_EX,
        }
    }
}

/// Handle on the root cache lock file
///
/// Opened once per cache location and reused for every acquisition.
#[derive(Debug)]
pub struct CacheLock {
    lock_path: PathBuf,
    lock_file: File,
}

impl CacheLock {
    /// Open (creating if needed) the lock file at `lock_path`
    ///
    /// The parent directory is created if absent.
    pub fn open(lock_path: &Path) -> RootCacheResult<Self> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RootCacheError::io(format!("creating cache directory {}", parent.display()), e)
            })?;
        }

        let lock_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(lock_path)
            .map_err(|e| RootCacheError::LockFailed {
                path: lock_path.to_path_buf(),
                source: e,
            })?;

        Ok(Self {
            lock_path: lock_path.to_path_buf(),
            lock_file,
        })
    }

    /// Acquire the lock, blocking until granted
    ///
    /// A non-blocking attempt is made first; on contention the
    /// [`WAIT_PHASE`] is reported while the blocking attempt waits.
    pub fn acquire(&self, mode: LockMode, progress: &dyn Progress) -> RootCacheResult<LockGuard<'_>> {
        if let Some(guard) = self.try_acquire(mode)? {
            return Ok(guard);
        }

        progress.start(WAIT_PHASE);
        let result = self.flock(mode.operation());
        progress.finish(WAIT_PHASE);
        result.map_err(|e| self.lock_error(e))?;

        debug!("Acquired {:?} lock on {} after waiting", mode, self.lock_path.display());
        Ok(LockGuard { lock: self, mode })
    }

    /// Acquire the lock without blocking; `None` if another holder conflicts
    pub fn try_acquire(&self, mode: LockMode) -> RootCacheResult<Option<LockGuard<'_>>> {
        match self.flock(mode.operation() | libc::LOCK_NB) {
            Ok(()) => {
                debug!("Acquired {:?} lock on {}", mode, self.lock_path.display());
                Ok(Some(LockGuard { lock: self, mode }))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(self.lock_error(e)),
        }
    }

    /// Release whatever lock this handle holds
    ///
    /// Releasing an unheld lock is a no-op.
    pub fn release(&self) -> RootCacheResult<()> {
        self.flock(libc::LOCK_UN).map_err(|e| self.lock_error(e))
    }

    /// Get the lock file path.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    fn flock(&self, operation: libc::c_int) -> io::Result<()> {
        let fd = self.lock_file.as_raw_fd();
        loop {
            // SAFETY: fd is owned by self.lock_file and stays open for the call.
            let result = unsafe { libc::flock(fd, operation) };
            if result == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn lock_error(&self, source: io::Error) -> RootCacheError {
        RootCacheError::LockFailed {
            path: self.lock_path.clone(),
            source,
        }
    }
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a CacheLock,
    mode: LockMode,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        debug!("Releasing {:?} lock on {}", self.mode, self.lock.lock_path.display());
        if let Err(e) = self.lock.release() {
            warn!("Failed to release root cache lock: {}", e);
        }
    }
}
