//! Journal entry types
//!
//! Defines the tracked-operation model:
//! - Operation identifiers
//! - The Create/Overwrite/Delete kind
//! - The closed operation state machine
//! - The durable [`MutationOperation`] record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Unique operation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub Uuid);

impl OperationId {
    /// Generate new operation ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of live-tree mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Target did not exist before the write
    Create,
    /// Target existed and its bytes were replaced
    Overwrite,
    /// Target existed and was unlinked
    Delete,
}

/// Operation lifecycle state
///
/// Closed tagged union; the only legal transitions are
/// `Requested -> Applied`, `Requested -> RolledBack` (failed write),
/// `Applied -> Committed`, and `Applied -> RolledBack`. Terminal states
/// are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    /// Journaled, filesystem mutation not yet confirmed
    Requested,
    /// Filesystem mutation succeeded, awaiting commit or rollback
    Applied,
    /// Backup discarded, new state final
    Committed,
    /// Pre-mutation state restored
    RolledBack,
}

impl OperationState {
    /// Whether this state is terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }

    /// States reachable from this one
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Requested => &[Self::Applied, Self::RolledBack],
            Self::Applied => &[Self::Committed, Self::RolledBack],
            Self::Committed | Self::RolledBack => &[],
        }
    }

    /// Validate a transition to `to`
    ///
    /// # Errors
    /// Returns the offending pair when the edge is not in the machine.
    pub fn transition(self, to: Self) -> Result<Self, InvalidTransition> {
        if self.allowed_transitions().contains(&to) {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Requested => "requested",
            Self::Applied => "applied",
            Self::Committed => "committed",
            Self::RolledBack => "rolled-back",
        };
        write!(f, "{name}")
    }
}

/// Illegal state-machine edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid operation transition: {from} -> {to}")]
pub struct InvalidTransition {
    /// State the operation was in
    pub from: OperationState,
    /// State the caller asked for
    pub to: OperationState,
}

/// One tracked live-tree edit
///
/// The persisted journal file is an array of these records; the in-memory
/// table is a cache of that file, never the other way around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationOperation {
    /// Operation ID
    pub id: OperationId,
    /// Absolute path being mutated
    pub target_path: PathBuf,
    /// Before-image location; `None` only for `Create`
    pub backup_path: Option<PathBuf>,
    /// Mutation kind
    pub kind: OperationKind,
    /// Lifecycle state
    pub state: OperationState,
    /// When the operation was journaled
    pub created_at: DateTime<Utc>,
}

impl MutationOperation {
    /// Create a new record in `Requested` state
    #[must_use]
    pub fn new(target_path: PathBuf, backup_path: Option<PathBuf>, kind: OperationKind) -> Self {
        Self {
            id: OperationId::new(),
            target_path,
            backup_path,
            kind,
            state: OperationState::Requested,
            created_at: Utc::now(),
        }
    }

    /// Whether the operation has reached a terminal state
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
