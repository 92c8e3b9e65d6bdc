//! Sandbox session handles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Unique sandbox session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate new session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One disposable validation workspace
///
/// The session directory is owned exclusively by the provisioner; the
/// validator only reads and executes inside a root it was handed.
#[derive(Debug, Clone)]
pub struct SandboxSession {
    /// Session ID, also the scratch directory name
    pub id: SessionId,
    /// Root of the session's working tree
    pub root: PathBuf,
    /// When the session was provisioned
    pub created_at: DateTime<Utc>,
    /// How long the session may live before the sweep reclaims it
    pub ttl: Duration,
}

impl SandboxSession {
    /// Whether the session has outlived its TTL
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let age = Utc::now().signed_duration_since(self.created_at);
        age.to_std().map(|age| age > self.ttl).unwrap_or(false)
    }
}
