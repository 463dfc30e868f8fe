//! Build lifecycle integration
//!
//! The orchestrator calls [`RootCacheController::handle`] at each of the
//! eight lifecycle events. The controller decides whether to unpack the
//! cache into the build root, rebuild the cache from it, or do nothing.
//!
//! | Event | Action |
//! |-------|--------|
//! | `pre-init` | evict stale archive, unpack unless the tree is reused |
//! | `pre-shell`, `pre-chroot` | unpack again on tmpfs |
//! | `pre-package-manager` | unpack again on tmpfs if empty or caching alterations |
//! | `post-init` | rebuild |
//! | `post-shell`, `post-chroot`, `post-package-manager` | rebuild on tmpfs when caching alterations |

mod controller;
pub mod fs_type;
mod tree;

pub use controller::{HookOutcome, RootCacheController, PACK_PHASE, UNPACK_PHASE};
pub use tree::{BuildTree, DirectoryTree, MountTable, ProcMounts};

use clap::ValueEnum;
use std::fmt;

/// Lifecycle events emitted by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum LifecycleEvent {
    /// Build root initialization is starting
    PreInit,
    /// An interactive shell is about to start
    PreShell,
    /// A command is about to run in the build root
    PreChroot,
    /// The package manager is about to run
    PrePackageManager,
    /// Build root initialization completed
    PostInit,
    /// An interactive shell exited
    PostShell,
    /// A command in the build root exited
    PostChroot,
    /// The package manager finished
    PostPackageManager,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreInit => "pre-init",
            Self::PreShell => "pre-shell",
            Self::PreChroot => "pre-chroot",
            Self::PrePackageManager => "pre-package-manager",
            Self::PostInit => "post-init",
            Self::PostShell => "post-shell",
            Self::PostChroot => "post-chroot",
            Self::PostPackageManager => "post-package-manager",
        };
        write!(f, "{}", name)
    }
}
