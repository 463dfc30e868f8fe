//! Filesystem type detection
//!
//! Some archive filters refuse to run from a root-squashed NFS directory, so
//! the filter's working directory is moved to local storage when needed.

use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(target_os = "linux")]
const NFS_SUPER_MAGIC: i64 = 0x6969;

/// Whether `path` lives on NFS
#[cfg(target_os = "linux")]
pub fn is_network_fs(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: statfs only writes into the zeroed struct we own.
    let mut stat: libc::statfs = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::statfs(c_path.as_ptr(), &mut stat) };
    #[allow(clippy::unnecessary_cast)]
    let f_type = stat.f_type as i64;
    result == 0 && f_type == NFS_SUPER_MAGIC
}

#[cfg(not(target_os = "linux"))]
pub fn is_network_fs(_path: &Path) -> bool {
    false
}

/// Working directory for archive filters
///
/// The current directory unless it is on NFS, otherwise the first local
/// directory among `$TMPDIR`, `/tmp`, `/var/tmp` and `/`.
pub fn archive_work_dir() -> PathBuf {
    match env::current_dir() {
        Ok(cwd) if !is_network_fs(&cwd) => cwd,
        Ok(cwd) => {
            let local = find_local_dir();
            debug!(
                "{} is on NFS; running archive filters from {}",
                cwd.display(),
                local.display()
            );
            local
        }
        Err(_) => find_local_dir(),
    }
}

fn find_local_dir() -> PathBuf {
    let candidates = [
        env::temp_dir(),
        PathBuf::from("/tmp"),
        PathBuf::from("/var/tmp"),
    ];
    candidates
        .into_iter()
        .find(|dir| dir.is_dir() && !is_network_fs(dir))
        .unwrap_or_else(|| PathBuf::from("/"))
}
