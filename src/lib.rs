//! rootcache - Shared archive cache for chroot build roots
//!
//! Packs a freshly initialized build root into a compressed archive and
//! unpacks it into later roots, guarded by a cross-process file lock.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod ui;

pub use error::{RootCacheError, RootCacheResult};
