//! Check manifest
//!
//! Declares the type-check/build/test entrypoints a sandbox can run
//! standalone. The provisioner guarantees every session has one; a missing
//! entrypoint means "nothing configured", which the validator treats as an
//! automatic pass - never as a failure.

use crate::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;

/// Manifest file name at the sandbox root
pub const MANIFEST_FILE: &str = "checks.json";

/// A command to execute inside the sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program to invoke
    pub program: String,
    /// Arguments, in order
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Build a command spec
    #[must_use]
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| (*arg).to_string()).collect(),
        }
    }
}

/// Declared check entrypoints for one project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckManifest {
    /// Static checker in check-only (no-emit) mode
    #[serde(default)]
    pub type_check: Option<CommandSpec>,
    /// Declared build entrypoint
    #[serde(default)]
    pub build: Option<CommandSpec>,
    /// Declared unit-test entrypoint
    #[serde(default)]
    pub unit_tests: Option<CommandSpec>,
}

impl CheckManifest {
    /// The manifest the provisioner writes when a source tree has none
    #[inline]
    #[must_use]
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Load the manifest from a sandbox root
    ///
    /// A missing file yields [`CheckManifest::minimal`] with a warning;
    /// a malformed file is a hard error, since the provisioner wrote or
    /// copied it and it should never be garbage.
    ///
    /// # Errors
    /// Returns [`SandboxError::Io`] on read or parse failure.
    pub async fn load(sandbox_root: &Path) -> Result<Self, SandboxError> {
        let path = sandbox_root.join(MANIFEST_FILE);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(sandbox = %sandbox_root.display(), "no check manifest; all checks pass vacuously");
                return Ok(Self::minimal());
            }
            Err(e) => return Err(SandboxError::io(&path, e)),
        };
        serde_json::from_str(&raw).map_err(|e| SandboxError::io(&path, e.into()))
    }

    /// Persist the manifest to a sandbox root
    ///
    /// # Errors
    /// Returns [`SandboxError::Io`] on write failure.
    pub async fn save(&self, sandbox_root: &Path) -> Result<(), SandboxError> {
        let path = sandbox_root.join(MANIFEST_FILE);
        let json =
            serde_json::to_vec_pretty(self).map_err(|e| SandboxError::io(&path, e.into()))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| SandboxError::io(&path, e))
    }
}
