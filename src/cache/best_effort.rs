//! Best-effort filesystem operations
//!
//! Used only for optional cleanup around the cache. None of these return an
//! error: `NotFound` and `PermissionDenied` are expected and logged at debug,
//! anything else is logged at warn.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Remove a file if present. Returns whether a file was removed.
pub fn remove_file(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            report("remove", path, &e);
            false
        }
    }
}

/// Truncate an existing file to zero length; never creates it
pub fn truncate_file(path: &Path) -> bool {
    match OpenOptions::new().write(true).truncate(true).open(path) {
        Ok(_) => true,
        Err(e) => {
            report("truncate", path, &e);
            false
        }
    }
}

/// Replace a file's contents
pub fn write_file(path: &Path, contents: &str) -> bool {
    match fs::write(path, contents) {
        Ok(()) => true,
        Err(e) => {
            report("write", path, &e);
            false
        }
    }
}

fn report(action: &str, path: &Path, err: &io::Error) {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            debug!("Skipped {} of {}: {}", action, path.display(), err)
        }
        _ => warn!("Could not {} {}: {}", action, path.display(), err),
    }
}
