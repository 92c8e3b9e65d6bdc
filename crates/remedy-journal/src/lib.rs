//! Remedy Operation Journal
//!
//! Makes live-tree file mutation transactional and crash-recoverable:
//! - Before-image backup capture before every overwrite or delete
//! - Durable journal persisted before the call returns
//! - Commit (discard backup) / rollback (restore backup) lifecycle
//! - Unconditional crash-recovery sweep at open
//! - Retention sweep for backups orphaned by unclean kills
//!
//! # Example
//!
//! ```rust,ignore
//! use remedy_journal::{JournalConfig, OperationJournal};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let journal = OperationJournal::open(project_root, JournalConfig::default()).await?;
//!
//! let id = journal.write_with_backup("src/a.ts", b"export const x = 2;").await?;
//! // ... external health check ...
//! journal.commit(&[id]).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod journal;
mod retention;
mod types;

pub use error::{JournalError, RollbackReport};
pub use journal::{JournalConfig, OperationJournal, BACKUP_DIR, JOURNAL_FILE};
pub use retention::{sweep_once, RetentionSweeper};
pub use types::{InvalidTransition, MutationOperation, OperationId, OperationKind, OperationState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
