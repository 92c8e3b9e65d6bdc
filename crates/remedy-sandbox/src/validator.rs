//! Validator pipeline
//!
//! Runs the ordered battery of checks - type check, build, unit tests -
//! inside a sandbox root and aggregates a verdict. Checks run sequentially:
//! later checks assume the sandbox is at least structurally sound, so the
//! first failure ends the battery early. Pipelines for different sessions
//! may run fully in parallel.

use crate::error::SandboxError;
use crate::manifest::{CheckManifest, CommandSpec};
use crate::store::CheckResultStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Identifies one fix attempt end to end
///
/// Check results are persisted keyed by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttemptId(pub Uuid);

impl AttemptId {
    /// Generate new attempt ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which check produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckKind {
    /// Static checker in no-emit mode
    TypeCheck,
    /// Declared build entrypoint
    Build,
    /// Declared unit-test entrypoint
    UnitTests,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::TypeCheck => "type-check",
            Self::Build => "build",
            Self::UnitTests => "unit-tests",
        };
        write!(f, "{name}")
    }
}

/// Validator configuration
///
/// Each check is independently toggleable with its own timeout budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Run the static type/compile check
    pub type_check: bool,
    /// Run the declared build entrypoint
    pub build: bool,
    /// Run the declared unit-test entrypoint
    pub unit_tests: bool,
    /// Type-check budget
    pub type_check_timeout: Duration,
    /// Build budget
    pub build_timeout: Duration,
    /// Unit-test budget
    pub test_timeout: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            type_check: true,
            build: true,
            unit_tests: true,
            type_check_timeout: Duration::from_secs(30),
            build_timeout: Duration::from_secs(60),
            test_timeout: Duration::from_secs(120),
        }
    }
}

/// One executed check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// Which check ran
    #[serde(rename = "testType")]
    pub kind: CheckKind,
    /// Whether it passed
    pub passed: bool,
    /// Captured stdout/stderr
    pub output: String,
    /// Diagnostic text on failure, verbatim from the tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Wall-clock duration
    pub duration_ms: u64,
}

/// Aggregate outcome of one pipeline run
///
/// `passed` is the logical AND over the checks that actually ran; skipped
/// checks never count against the verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// Overall pass/fail
    pub passed: bool,
    /// Per-check results in execution order
    pub results: Vec<CheckResult>,
}

impl ValidationVerdict {
    /// Result for a specific check, if it ran
    #[must_use]
    pub fn result_for(&self, kind: CheckKind) -> Option<&CheckResult> {
        self.results.iter().find(|result| result.kind == kind)
    }
}

/// Ordered check battery over a sandbox root
#[derive(Debug)]
pub struct ValidatorPipeline {
    config: ValidatorConfig,
    store: Arc<dyn CheckResultStore>,
}

impl ValidatorPipeline {
    /// Create a pipeline with a result store
    #[inline]
    #[must_use]
    pub fn new(config: ValidatorConfig, store: Arc<dyn CheckResultStore>) -> Self {
        Self { config, store }
    }

    /// Pipeline configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Run the enabled checks against a sandbox root
    ///
    /// Check order is fixed: type check, build, unit tests. A check whose
    /// entrypoint is not declared in the sandbox manifest passes
    /// automatically - "no build configured" is never "build failed". A
    /// timed-out check is recorded as a failure and its subprocess is
    /// killed, never merely abandoned. The first failing check ends the
    /// battery; a sandbox that already failed never spends the later
    /// checks' budgets.
    ///
    /// # Errors
    /// Returns [`SandboxError`] only for infrastructure failures (manifest
    /// unreadable, subprocess unspawnable). Check failures and timeouts are
    /// verdict data, not errors.
    pub async fn run(
        &self,
        sandbox_root: &Path,
        attempt: AttemptId,
    ) -> Result<ValidationVerdict, SandboxError> {
        let manifest = CheckManifest::load(sandbox_root).await?;

        let battery: [(CheckKind, bool, Option<&CommandSpec>, Duration); 3] = [
            (
                CheckKind::TypeCheck,
                self.config.type_check,
                manifest.type_check.as_ref(),
                self.config.type_check_timeout,
            ),
            (
                CheckKind::Build,
                self.config.build,
                manifest.build.as_ref(),
                self.config.build_timeout,
            ),
            (
                CheckKind::UnitTests,
                self.config.unit_tests,
                manifest.unit_tests.as_ref(),
                self.config.test_timeout,
            ),
        ];

        let mut results = Vec::new();
        for (kind, enabled, command, budget) in battery {
            if !enabled {
                tracing::debug!(check = %kind, "check disabled; skipped");
                continue;
            }
            let result = match command {
                Some(spec) => run_check(sandbox_root, kind, spec, budget).await?,
                None => {
                    tracing::debug!(check = %kind, "no entrypoint configured; automatic pass");
                    CheckResult {
                        kind,
                        passed: true,
                        output: format!("no {kind} entrypoint configured"),
                        error_message: None,
                        duration_ms: 0,
                    }
                }
            };

            if let Err(e) = self.store.record(attempt, &result).await {
                tracing::warn!(attempt = %attempt, check = %kind, error = %e, "failed to persist check result");
            }
            let failed = !result.passed;
            results.push(result);
            if failed {
                tracing::info!(check = %kind, "check failed; skipping remaining checks");
                break;
            }
        }

        let passed = results.iter().all(|result| result.passed);
        if !passed {
            tracing::info!(attempt = %attempt, "validation failed");
        }
        Ok(ValidationVerdict { passed, results })
    }
}

/// Execute one check subprocess with a timeout budget
async fn run_check(
    sandbox_root: &Path,
    kind: CheckKind,
    spec: &CommandSpec,
    budget: Duration,
) -> Result<CheckResult, SandboxError> {
    let started = Instant::now();

    let mut command = tokio::process::Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(sandbox_root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // On timeout the wait future is dropped; this turns that drop into
        // a SIGKILL so the checker never outlives its budget.
        .kill_on_drop(true);

    let child = command.spawn().map_err(|e| SandboxError::Spawn {
        program: spec.program.clone(),
        source: e,
    })?;

    match tokio::time::timeout(budget, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let duration_ms = started.elapsed().as_millis() as u64;
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.is_empty() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&stderr);
            }

            let passed = output.status.success();
            let error_message = if passed {
                None
            } else if text.trim().is_empty() {
                Some(format!("{} exited with {}", spec.program, output.status))
            } else {
                Some(text.clone())
            };

            tracing::debug!(check = %kind, passed, duration_ms, "check finished");
            Ok(CheckResult {
                kind,
                passed,
                output: text,
                error_message,
                duration_ms,
            })
        }
        Ok(Err(e)) => Err(SandboxError::io(sandbox_root, e)),
        Err(_elapsed) => {
            let duration_ms = started.elapsed().as_millis() as u64;
            tracing::warn!(check = %kind, budget_secs = budget.as_secs(), "check timed out; subprocess killed");
            Ok(CheckResult {
                kind,
                passed: false,
                output: String::new(),
                error_message: Some(format!(
                    "{kind} timed out after {}s; subprocess killed",
                    budget.as_secs()
                )),
                duration_ms,
            })
        }
    }
}
