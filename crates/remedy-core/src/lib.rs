//! Remedy Core - fix pipeline orchestrator
//!
//! Sequences the safe-mutation protocol end to end:
//! 1. Provision a disposable sandbox copy of the live tree
//! 2. Apply the untrusted proposed edits to the sandbox
//! 3. Run the validator pipeline; a failing verdict is a hard gate
//! 4. On pass, apply the same edits to the live tree through the
//!    operation journal
//! 5. Hand commit/rollback to the external health monitor
//!
//! The orchestrator never makes the commit-or-rollback business decision
//! itself and never retries; both belong to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use remedy_core::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = FixPipeline::open(PipelineConfig::new(project_root)).await?;
//!
//! match pipeline.propose(&changes).await? {
//!     FixOutcome::Applied { operation_ids, .. } => {
//!         // ... external health window ...
//!         pipeline.commit(&operation_ids).await?;
//!     }
//!     FixOutcome::Rejected { verdict, .. } => {
//!         eprintln!("rejected: {:?}", verdict.results);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod error;
mod pipeline;

pub use config::PipelineConfig;
pub use error::RemedyError;
pub use pipeline::{FixOutcome, FixPipeline};

// Re-exports for convenience
pub use remedy_guard::{GuardError, SafePath};
pub use remedy_journal::{
    JournalConfig, JournalError, MutationOperation, OperationId, OperationJournal, OperationKind,
    OperationState, RetentionSweeper, RollbackReport,
};
pub use remedy_sandbox::{
    AttemptId, ChangeOp, CheckKind, CheckManifest, CheckResult, CheckResultStore, CommandSpec,
    JsonResultStore, MemoryResultStore, ProposedChange, SandboxError, SandboxProvisioner,
    SandboxSession, SessionId, SessionSweeper, ValidationVerdict, ValidatorConfig,
    ValidatorPipeline,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the fix pipeline
    pub use crate::{
        AttemptId, ChangeOp, FixOutcome, FixPipeline, OperationId, PipelineConfig, ProposedChange,
        RemedyError, ValidationVerdict, ValidatorConfig,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
