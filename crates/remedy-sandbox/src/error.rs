//! Error types for sandbox provisioning and validation

use crate::session::SessionId;
use remedy_guard::GuardError;
use std::path::PathBuf;

/// Sandbox failures
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Path rejected by the guard
    #[error("path rejected: {0}")]
    Guard(#[from] GuardError),

    /// Filesystem failure inside the scratch tree
    #[error("filesystem error at {path}: {source}")]
    Io {
        /// Path the failing call targeted
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Create/Modify change without replacement content
    #[error("change for {0} has no new content")]
    MissingContent(String),

    /// Check subprocess could not be spawned
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program the manifest named
        program: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// Session id not present in the registry
    #[error("unknown sandbox session: {0}")]
    UnknownSession(SessionId),
}

impl SandboxError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
