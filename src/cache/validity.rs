//! Aging policy for the root cache archive
//!
//! [`ValidityPolicy::evaluate`] is a pure decision over already-collected
//! timestamps. Deleting a stale archive is the caller's job.

use crate::config::schema::RootCacheConfig;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

const SECS_PER_DAY: f64 = 60.0 * 60.0 * 24.0;

/// Outcome of checking an archive against the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityVerdict {
    /// Archive exists and may be unpacked
    Fresh,
    /// Archive is older than `max_age_days`
    StaleByAge,
    /// A tracked config file changed after the archive was written
    StaleByConfig,
    /// No archive (or it could not be statted)
    Missing,
}

impl ValidityVerdict {
    /// Whether the archive should be evicted
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleByAge | Self::StaleByConfig)
    }
}

impl fmt::Display for ValidityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::StaleByAge => write!(f, "stale (aged out)"),
            Self::StaleByConfig => write!(f, "stale (config changed)"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

/// Timestamps of the archive file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveStat {
    /// Inode change time, used as the archive's creation time
    pub changed: SystemTime,
    /// Content modification time
    pub modified: SystemTime,
}

impl ArchiveStat {
    /// Stat an archive; any error is treated as a missing archive
    pub fn read(path: &Path) -> Option<Self> {
        match fs::metadata(path) {
            Ok(meta) => Some(Self {
                changed: epoch_time(meta.ctime(), meta.ctime_nsec()),
                modified: meta.modified().unwrap_or(UNIX_EPOCH),
            }),
            Err(e) => {
                debug!("Cannot stat {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Age in days relative to `now`, computed as a fractional ratio
    pub fn age_days(&self, now: SystemTime) -> f64 {
        now.duration_since(self.changed)
            .map(|elapsed| elapsed.as_secs_f64() / SECS_PER_DAY)
            .unwrap_or(0.0)
    }
}

/// Modification time of a tracked config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStamp {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl ConfigStamp {
    /// Stat every config path, skipping the ones that cannot be read
    pub fn collect(paths: &[PathBuf]) -> Vec<Self> {
        paths
            .iter()
            .filter_map(|path| match fs::metadata(path).and_then(|m| m.modified()) {
                Ok(modified) => Some(Self {
                    path: path.clone(),
                    modified,
                }),
                Err(e) => {
                    debug!("Skipping freshness check for {}: {}", path.display(), e);
                    None
                }
            })
            .collect()
    }
}

/// When an existing archive may be reused
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidityPolicy {
    /// Expire archives older than `max_age_days`
    pub age_check: bool,
    /// Maximum archive age in days
    pub max_age_days: f64,
    /// Expire archives older than a tracked config file
    pub config_check: bool,
}

impl ValidityPolicy {
    pub fn from_config(config: &RootCacheConfig) -> Self {
        Self {
            age_check: config.age_check,
            max_age_days: config.max_age_days,
            config_check: config.config_check,
        }
    }

    /// Decide whether an archive is usable
    ///
    /// Age is checked first; the config comparison short-circuits on the
    /// first file strictly newer than the archive.
    pub fn evaluate(
        &self,
        archive: Option<&ArchiveStat>,
        configs: &[ConfigStamp],
        now: SystemTime,
    ) -> ValidityVerdict {
        let Some(archive) = archive else {
            return ValidityVerdict::Missing;
        };

        if self.age_check && archive.age_days(now) > self.max_age_days {
            return ValidityVerdict::StaleByAge;
        }

        if self.config_check {
            if let Some(newer) = configs.iter().find(|c| c.modified > archive.modified) {
                debug!("{} newer than root cache", newer.path.display());
                return ValidityVerdict::StaleByConfig;
            }
        }

        ValidityVerdict::Fresh
    }

    /// Stat the archive and config files, then evaluate against the current time
    pub fn check(&self, archive_path: &Path, config_paths: &[PathBuf]) -> ValidityVerdict {
        let archive = ArchiveStat::read(archive_path);
        let configs = if archive.is_some() && self.config_check {
            ConfigStamp::collect(config_paths)
        } else {
            Vec::new()
        };
        self.evaluate(archive.as_ref(), &configs, SystemTime::now())
    }
}

fn epoch_time(secs: i64, nsecs: i64) -> SystemTime {
    let secs = u64::try_from(secs).unwrap_or(0);
    let nsecs = u32::try_from(nsecs).unwrap_or(0);
    UNIX_EPOCH + Duration::new(secs, nsecs)
}
