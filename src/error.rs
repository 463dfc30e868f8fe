//! Error types for rootcache
//!
//! All modules use `RootCacheResult<T>` as their return type.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Result type alias for rootcache operations
pub type RootCacheResult<T> = Result<T, RootCacheError>;

/// All errors that can occur in rootcache
#[derive(Error, Debug)]
pub enum RootCacheError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    // Lock errors
    #[error("Failed to lock {path}: {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Archive errors
    #[error("Failed to start {program}: {source}")]
    FilterSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    ArchiveTool {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Archive error for {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid exclude pattern: {0}")]
    Pattern(#[from] globset::Error),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RootCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an archive error for the given archive path
    pub fn archive(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::LockFailed { .. } => {
                Some("Check that the shared cache directory is writable and supports file locks")
            }
            Self::FilterSpawn { .. } => {
                Some("Install the compression program or set root_cache.compress_program = \"none\"")
            }
            Self::ArchiveTool { .. } | Self::Archive { .. } => {
                Some("The cache archive may be corrupt; remove it to force a rebuild")
            }
            Self::ConfigInvalid { .. } => Some("Run: rootcache status -v to inspect the loaded config"),
            _ => None,
        }
    }
}
