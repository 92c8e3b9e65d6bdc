//! Error types for the operation journal

use crate::types::{InvalidTransition, OperationId};
use remedy_guard::GuardError;
use std::path::PathBuf;

/// Journal operation failures
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// Path rejected by the guard
    #[error("path rejected: {0}")]
    Guard(#[from] GuardError),

    /// Filesystem failure (permission, disk full, missing parent)
    #[error("filesystem error at {path}: {source}")]
    Io {
        /// Path the failing call targeted
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Delete of a path that does not exist
    #[error("target does not exist: {0}")]
    MissingTarget(PathBuf),

    /// Commit of an id the journal does not track
    ///
    /// A hard failure: committing something unknown is a caller bug.
    /// Rollback of an unknown id is a no-op instead.
    #[error("unknown operation: {0}")]
    UnknownOperation(OperationId),

    /// Illegal state-machine edge
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl JournalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Outcome of a whole-table rollback sweep
///
/// Per-operation failures never abort the sweep; they are collected here
/// for the caller to report or escalate.
#[derive(Debug, Default)]
pub struct RollbackReport {
    /// Operations restored to their pre-mutation state
    pub rolled_back: Vec<OperationId>,
    /// Operations whose restore failed, with the cause
    pub failures: Vec<(OperationId, JournalError)>,
}

impl RollbackReport {
    /// Whether every non-terminal operation was restored
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
