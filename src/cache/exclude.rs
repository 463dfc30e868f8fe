//! Exclusion rules for root cache archives
//!
//! Patterns are archive-relative (`./proc`) and act as path-prefix skips:
//! an excluded directory is never descended into.

use crate::error::RootCacheResult;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

/// Ordered, distinct set of exclude patterns
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    rules: Vec<Rule>,
    glob_set: GlobSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    /// Archive-relative form, e.g. `./var/cache/dnf`
    pattern: String,
    /// Matched verbatim; glob metacharacters are escaped
    literal: bool,
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            glob_set: GlobSet::empty(),
        }
    }
}

impl ExclusionSet {
    /// Build from configured patterns; duplicates and empty patterns are dropped
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> RootCacheResult<Self> {
        let mut rules: Vec<Rule> = Vec::new();
        for pattern in patterns {
            if let Some(rel) = normalize(pattern.as_ref()) {
                let pattern = format!("./{}", rel);
                if !rules.iter().any(|r| r.pattern == pattern) {
                    rules.push(Rule {
                        pattern,
                        literal: false,
                    });
                }
            }
        }
        Self::build(rules)
    }

    /// Extend with active mount points, rendered as `.` + mount path
    ///
    /// Mount paths are matched literally, even when they contain `*`, `[` or `{`.
    pub fn with_mount_points(&self, mounts: &[PathBuf]) -> RootCacheResult<Self> {
        let mut rules = self.rules.clone();
        for mount in mounts {
            let pattern = render_mount(mount);
            if normalize(&pattern).is_some() && !rules.iter().any(|r| r.pattern == pattern) {
                rules.push(Rule {
                    pattern,
                    literal: true,
                });
            }
        }
        Self::build(rules)
    }

    fn build(rules: Vec<Rule>) -> RootCacheResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for rule in &rules {
            if let Some(rel) = normalize(&rule.pattern) {
                let glob = if rule.literal {
                    globset::escape(&rel)
                } else {
                    rel
                };
                builder.add(Glob::new(&glob)?);
                builder.add(Glob::new(&format!("{}/**", glob))?);
            }
        }

        Ok(Self {
            rules,
            glob_set: builder.build()?,
        })
    }

    /// Check if a tree-relative path is excluded
    pub fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        let trimmed = path_str.trim_start_matches("./").trim_start_matches('/');
        self.glob_set.is_match(trimmed)
    }

    /// Patterns in archive-relative form
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.pattern.as_str())
    }

    /// Literal (non-glob) patterns as tree-relative directories
    ///
    /// These are recreated as empty mount points after unpacking.
    pub fn directories(&self) -> Vec<PathBuf> {
        self.rules
            .iter()
            .filter(|r| r.literal || !r.pattern.contains(['*', '?', '[', '{']))
            .filter_map(|r| normalize(&r.pattern).map(PathBuf::from))
            .collect()
    }
}

/// Render a mount point as an archive-relative exclude pattern
///
/// `/proc` and `proc` both become `./proc`.
pub fn render_mount(mount: &Path) -> String {
    let raw = mount.to_string_lossy();
    if raw.starts_with('/') {
        format!(".{}", raw)
    } else {
        format!("./{}", raw)
    }
}

/// Strip `./` and `/` prefixes and trailing slashes; `None` for the root itself
fn normalize(pattern: &str) -> Option<String> {
    let mut rest = pattern.trim();
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() || rest == "." {
        None
    } else {
        Some(rest.to_string())
    }
}
