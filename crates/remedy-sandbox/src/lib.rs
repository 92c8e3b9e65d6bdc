//! Remedy Sandbox
//!
//! Isolated, disposable validation workspaces for untrusted proposed edits:
//! - [`SandboxProvisioner`]: materializes a throwaway copy of a project tree
//! - [`ProposedChange`]: one untrusted file edit, applied through the guard
//! - [`ValidatorPipeline`]: ordered battery of subprocess checks with
//!   per-check timeout budgets
//! - [`CheckResultStore`]: persistence of every check result for forensics
//!
//! A failing verdict is a hard gate: the orchestrator must not touch the
//! live tree for that batch.
//!
//! # Example
//!
//! ```rust,ignore
//! use remedy_sandbox::{SandboxProvisioner, ValidatorPipeline, ValidatorConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provisioner = SandboxProvisioner::new(scratch, ttl);
//! let session = provisioner.provision(project_root).await?;
//! provisioner.apply_changes(session.id, &changes).await?;
//!
//! let verdict = validator.run(&session.root, attempt).await?;
//! provisioner.teardown(session.id).await;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod change;
mod error;
mod manifest;
mod provision;
mod session;
mod store;
mod validator;

pub use change::{ChangeOp, ProposedChange};
pub use error::SandboxError;
pub use manifest::{CheckManifest, CommandSpec, MANIFEST_FILE};
pub use provision::{SandboxProvisioner, SessionSweeper};
pub use session::{SandboxSession, SessionId};
pub use store::{CheckResultStore, JsonResultStore, MemoryResultStore};
pub use validator::{
    AttemptId, CheckKind, CheckResult, ValidationVerdict, ValidatorConfig, ValidatorPipeline,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
