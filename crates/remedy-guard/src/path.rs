//! Validated relative paths
//!
//! Provides [`SafePath`] for confining untrusted path input to a root.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// A relative path that has passed guard validation
///
/// Construction goes through [`SafePath::validate`], which performs lexical
/// normalization only - no filesystem access. A `SafePath` can therefore
/// name a file that does not exist yet.
///
/// # Examples
/// - `src/handlers/auth.ts` → accepted
/// - `/etc/passwd` → rejected (absolute)
/// - `../../secrets.env` → rejected (escapes the root)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SafePath(PathBuf);

impl SafePath {
    /// Validate untrusted input into a safe relative path
    ///
    /// Rejects empty input, absolute paths, paths beginning with a
    /// separator, Windows drive/verbatim prefixes, and any input whose
    /// parent-directory segments would climb above the root after lexical
    /// normalization. `.` segments are dropped; interior `..` segments are
    /// resolved against the segments already seen.
    ///
    /// # Errors
    /// Returns [`GuardError`] describing the rejection.
    pub fn validate(raw: &str) -> Result<Self, GuardError> {
        if raw.trim().is_empty() {
            return Err(GuardError::Empty);
        }
        if raw.starts_with('/') || raw.starts_with('\\') {
            return Err(GuardError::Absolute(raw.to_string()));
        }

        let candidate = Path::new(raw);
        let mut normalized = PathBuf::new();

        for component in candidate.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    return Err(GuardError::Absolute(raw.to_string()));
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    // A `..` that cannot be absorbed lexically escapes the root.
                    if !normalized.pop() {
                        return Err(GuardError::Traversal(raw.to_string()));
                    }
                }
                Component::Normal(segment) => normalized.push(segment),
            }
        }

        if normalized.as_os_str().is_empty() {
            return Err(GuardError::Empty);
        }

        Ok(Self(normalized))
    }

    /// Resolve this path under a root directory
    ///
    /// The returned path is guaranteed to stay inside `root` because the
    /// relative part carries no prefix, root, or unresolved `..` segments.
    #[inline]
    #[must_use]
    pub fn resolve(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }

    /// Get the validated relative path
    #[inline]
    #[must_use]
    pub fn as_rel_path(&self) -> &Path {
        &self.0
    }

    /// Final path component, if any
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|name| name.to_str())
    }
}

impl Display for SafePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl FromStr for SafePath {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::validate(s)
    }
}

impl AsRef<Path> for SafePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Path guard rejections
///
/// Always fatal to the single requested operation, never to the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    /// Empty or whitespace-only input
    #[error("path is empty")]
    Empty,

    /// Absolute path or separator-prefixed input
    #[error("absolute path rejected: {0}")]
    Absolute(String),

    /// Parent-directory traversal escaping the root
    #[error("path traversal rejected: {0}")]
    Traversal(String),
}
