//! Compression backends for the root cache archive
//!
//! Each backend is an external filter program streamed through stdin/stdout.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Supported compression backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Plain tar, no filter
    None,
    /// gzip
    Gzip,
    /// Parallel gzip (same format as gzip)
    Pigz,
    /// Zstandard
    Zstd,
    /// xz / LZMA2
    Xz,
    /// bzip2
    Bzip2,
}

impl Compression {
    /// Filter program name, `None` for uncompressed archives
    pub fn program(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Gzip => Some("gzip"),
            Self::Pigz => Some("pigz"),
            Self::Zstd => Some("zstd"),
            Self::Xz => Some("xz"),
            Self::Bzip2 => Some("bzip2"),
        }
    }

    /// Arguments that make the program compress stdin to stdout
    pub fn compress_args(&self) -> &'static [&'static str] {
        match self {
            Self::None => &[],
            Self::Zstd => &["-q", "-c"],
            Self::Gzip | Self::Pigz | Self::Xz | Self::Bzip2 => &["-c"],
        }
    }

    /// Arguments that make the program decompress stdin to stdout
    pub fn decompress_args(&self) -> &'static [&'static str] {
        match self {
            Self::None => &[],
            Self::Zstd => &["-q", "-d", "-c"],
            Self::Gzip | Self::Pigz | Self::Xz | Self::Bzip2 => &["-d", "-c"],
        }
    }

    /// Default archive suffix appended after `.tar`
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip | Self::Pigz => ".gz",
            Self::Zstd => ".zst",
            Self::Xz => ".xz",
            Self::Bzip2 => ".bz2",
        }
    }

    /// Next backend to try when this one is not installed
    fn fallback(&self) -> Option<Self> {
        match self {
            Self::None => None,
            Self::Gzip => Some(Self::None),
            Self::Pigz | Self::Zstd | Self::Xz | Self::Bzip2 => Some(Self::Gzip),
        }
    }

    /// Pick the first available backend along the fallback chain
    ///
    /// `probe` reports whether a program can be executed on this host.
    pub fn resolve_with(self, probe: impl Fn(&str) -> bool) -> Self {
        let mut current = self;
        loop {
            let Some(program) = current.program() else {
                return current;
            };
            if probe(program) {
                return current;
            }
            match current.fallback() {
                Some(next) => {
                    warn!(
                        "specified '{}' as the root cache compress program but not available; using {}",
                        program, next
                    );
                    current = next;
                }
                None => return current,
            }
        }
    }

    /// Pick the first available backend, probing with `<program> --version`
    pub fn resolve(self) -> Self {
        self.resolve_with(program_available)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program().unwrap_or("none"))
    }
}

/// Check if a program runs on this host
pub fn program_available(program: &str) -> bool {
    let available = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    debug!("Probe {}: available={}", program, available);
    available
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions() {
        assert_eq!(Compression::None.extension(), "");
        assert_eq!(Compression::Pigz.extension(), ".gz");
        assert_eq!(Compression::Gzip.extension(), ".gz");
        assert_eq!(Compression::Zstd.extension(), ".zst");
    }

    #[test]
    fn none_has_no_filter() {
        assert_eq!(Compression::None.program(), None);
        assert!(Compression::None.compress_args().is_empty());
        assert!(Compression::None.decompress_args().is_empty());
    }

    #[test]
    fn available_program_is_kept() {
        assert_eq!(Compression::Pigz.resolve_with(|_| true), Compression::Pigz);
    }

    #[test]
    fn pigz_falls_back_to_gzip() {
        let resolved = Compression::Pigz.resolve_with(|p| p == "gzip");
        assert_eq!(resolved, Compression::Gzip);
    }

    #[test]
    fn nothing_available_means_uncompressed() {
        assert_eq!(Compression::Zstd.resolve_with(|_| false), Compression::None);
    }

    #[test]
    fn missing_program_probe_fails() {
        assert!(!program_available("rootcache-no-such-compressor"));
    }

    #[test]
    fn display_uses_program_name() {
        assert_eq!(Compression::Bzip2.to_string(), "bzip2");
        assert_eq!(Compression::None.to_string(), "none");
    }
}
