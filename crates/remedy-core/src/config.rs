//! Pipeline configuration

use remedy_sandbox::ValidatorConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one [`FixPipeline`](crate::FixPipeline)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Live project root this pipeline owns
    ///
    /// A single process owns a given root; running two pipelines against
    /// the same root concurrently is unsafe without external locking.
    pub project_root: PathBuf,
    /// Scratch directory for sandbox sessions
    pub scratch_root: PathBuf,
    /// Directory for persisted check results, keyed per attempt
    pub results_dir: PathBuf,
    /// Sandbox session TTL before the sweep reclaims it
    pub sandbox_ttl: Duration,
    /// Validator check toggles and budgets
    pub validator: ValidatorConfig,
    /// Age beyond which orphaned backups are purged
    pub backup_max_age: Duration,
    /// Interval for the retention and session sweeps
    pub sweep_interval: Duration,
}

impl PipelineConfig {
    /// Configuration with defaults derived from a project root
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            scratch_root: std::env::temp_dir().join("remedy-sandboxes"),
            results_dir: project_root.join(".validation"),
            sandbox_ttl: Duration::from_secs(10 * 60),
            validator: ValidatorConfig::default(),
            backup_max_age: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            project_root,
        }
    }

    /// With a scratch directory
    #[inline]
    #[must_use]
    pub fn with_scratch_root(mut self, scratch_root: impl Into<PathBuf>) -> Self {
        self.scratch_root = scratch_root.into();
        self
    }

    /// With a check-result directory
    #[inline]
    #[must_use]
    pub fn with_results_dir(mut self, results_dir: impl Into<PathBuf>) -> Self {
        self.results_dir = results_dir.into();
        self
    }

    /// With validator settings
    #[inline]
    #[must_use]
    pub fn with_validator(mut self, validator: ValidatorConfig) -> Self {
        self.validator = validator;
        self
    }

    /// With a sandbox session TTL
    #[inline]
    #[must_use]
    pub fn with_sandbox_ttl(mut self, ttl: Duration) -> Self {
        self.sandbox_ttl = ttl;
        self
    }
}
