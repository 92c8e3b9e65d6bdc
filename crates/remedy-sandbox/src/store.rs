//! Check-result persistence
//!
//! Every check result is recorded keyed by the originating fix attempt for
//! later forensic review, independent of whether the caller ever reads it
//! back. Store failures are logged by the pipeline, never escalated - an
//! audit gap must not fail a validation run.

use crate::error::SandboxError;
use crate::validator::{AttemptId, CheckResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Persistence seam for check results
#[async_trait]
pub trait CheckResultStore: Send + Sync + std::fmt::Debug {
    /// Record one check result for an attempt
    async fn record(&self, attempt: AttemptId, result: &CheckResult) -> Result<(), SandboxError>;
}

/// Appends results as JSON lines to `<dir>/<attempt>.jsonl`
#[derive(Debug)]
pub struct JsonResultStore {
    dir: PathBuf,
}

impl JsonResultStore {
    /// Create a store writing under `dir`
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl CheckResultStore for JsonResultStore {
    async fn record(&self, attempt: AttemptId, result: &CheckResult) -> Result<(), SandboxError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SandboxError::io(&self.dir, e))?;

        let path = self.dir.join(format!("{attempt}.jsonl"));
        let mut line =
            serde_json::to_vec(result).map_err(|e| SandboxError::io(&path, e.into()))?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| SandboxError::io(&path, e))?;
        file.write_all(&line)
            .await
            .map_err(|e| SandboxError::io(&path, e))?;
        file.flush().await.map_err(|e| SandboxError::io(&path, e))
    }
}

/// In-memory store for tests and read-back
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    results: Mutex<HashMap<AttemptId, Vec<CheckResult>>>,
}

impl MemoryResultStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Results recorded for an attempt, in execution order
    pub async fn results_for(&self, attempt: AttemptId) -> Vec<CheckResult> {
        self.results
            .lock()
            .await
            .get(&attempt)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CheckResultStore for MemoryResultStore {
    async fn record(&self, attempt: AttemptId, result: &CheckResult) -> Result<(), SandboxError> {
        self.results
            .lock()
            .await
            .entry(attempt)
            .or_default()
            .push(result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::CheckKind;
    use tempfile::TempDir;

    fn sample(kind: CheckKind, passed: bool) -> CheckResult {
        CheckResult {
            kind,
            passed,
            output: "out".to_string(),
            error_message: (!passed).then(|| "boom".to_string()),
            duration_ms: 12,
        }
    }

    #[tokio::test]
    async fn json_store_appends_one_line_per_result() {
        let dir = TempDir::new().unwrap();
        let store = JsonResultStore::new(dir.path());
        let attempt = AttemptId::new();

        store
            .record(attempt, &sample(CheckKind::TypeCheck, true))
            .await
            .unwrap();
        store
            .record(attempt, &sample(CheckKind::Build, false))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join(format!("{attempt}.jsonl"))).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: CheckResult = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.kind, CheckKind::TypeCheck);
        let second: CheckResult = serde_json::from_str(lines[1]).unwrap();
        assert!(!second.passed);
        assert_eq!(second.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn memory_store_keys_by_attempt() {
        let store = MemoryResultStore::new();
        let a = AttemptId::new();
        let b = AttemptId::new();

        store.record(a, &sample(CheckKind::TypeCheck, true)).await.unwrap();
        store.record(b, &sample(CheckKind::Build, true)).await.unwrap();

        assert_eq!(store.results_for(a).await.len(), 1);
        assert_eq!(store.results_for(b).await.len(), 1);
        assert!(store.results_for(AttemptId::new()).await.is_empty());
    }
}
