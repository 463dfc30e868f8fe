//! Shared archive cache for build roots
//!
//! A fully prepared build root is stored as one (optionally compressed) tar
//! archive in a shared directory. Concurrent builders coordinate through an
//! advisory lock file next to it.
//!
//! # Shared directory layout
//!
//! | File | Purpose |
//! |------|---------|
//! | `cache.tar[.<ext>]` | The archive |
//! | `cache.log` | Install output of the last rebuild (best effort) |
//! | `rootcache.lock` | Lock target, never read |
//!
//! # Locking
//!
//! | Operation | Mode |
//! |-----------|------|
//! | unpack | shared |
//! | pack | exclusive |

pub mod archive;
pub mod best_effort;
pub mod compression;
pub mod exclude;
pub mod location;
pub mod lock;
pub mod validity;

pub use archive::ArchiveCodec;
pub use compression::Compression;
pub use exclude::ExclusionSet;
pub use location::CacheLocation;
pub use lock::{CacheLock, LockGuard, LockMode};
pub use validity::{ArchiveStat, ConfigStamp, ValidityPolicy, ValidityVerdict};
