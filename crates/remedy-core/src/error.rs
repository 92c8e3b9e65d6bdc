//! Aggregate error type for the fix pipeline

use remedy_journal::{JournalError, OperationId};
use remedy_sandbox::{AttemptId, SandboxError};

/// Fix pipeline failures
#[derive(Debug, thiserror::Error)]
pub enum RemedyError {
    /// Journal-layer failure
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    /// Sandbox-layer failure
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    /// A live apply failed mid-batch
    ///
    /// Operations already applied for the attempt were rolled back before
    /// this surfaced; `rolled_back` lists them.
    #[error("live apply for attempt {attempt} failed; {} operation(s) rolled back: {source}", rolled_back.len())]
    LiveApplyFailed {
        /// The failing attempt
        attempt: AttemptId,
        /// Operations restored during the abort
        rolled_back: Vec<OperationId>,
        /// The journal error that aborted the batch
        #[source]
        source: JournalError,
    },
}
