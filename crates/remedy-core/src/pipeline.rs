//! Fix pipeline orchestrator
//!
//! Thin by design: the hard guarantees live in the journal and the
//! sandbox; this module only sequences them and owns the background
//! sweeps.

use crate::config::PipelineConfig;
use crate::error::RemedyError;
use remedy_journal::{
    JournalConfig, MutationOperation, OperationId, OperationJournal, RetentionSweeper,
    RollbackReport,
};
use remedy_sandbox::{
    AttemptId, ChangeOp, CheckResultStore, JsonResultStore, ProposedChange, SandboxError,
    SandboxProvisioner, SandboxSession, SessionSweeper, ValidationVerdict, ValidatorPipeline,
};
use std::sync::Arc;

/// Outcome of one proposed fix
#[derive(Debug)]
pub enum FixOutcome {
    /// Verdict passed and the live tree was mutated through the journal
    ///
    /// The external health monitor must follow up with exactly one of
    /// commit or rollback for `operation_ids`.
    Applied {
        /// The attempt these operations belong to
        attempt: AttemptId,
        /// Journaled live operations, in apply order
        operation_ids: Vec<OperationId>,
        /// The passing verdict
        verdict: ValidationVerdict,
    },
    /// Verdict failed; the live tree was never touched
    Rejected {
        /// The rejected attempt
        attempt: AttemptId,
        /// The failing verdict with per-check diagnostics
        verdict: ValidationVerdict,
    },
}

impl FixOutcome {
    /// Whether the fix reached the live tree
    #[inline]
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// The verdict either way
    #[inline]
    #[must_use]
    pub fn verdict(&self) -> &ValidationVerdict {
        match self {
            Self::Applied { verdict, .. } | Self::Rejected { verdict, .. } => verdict,
        }
    }
}

/// Sequences sandbox validation and journaled live application
#[derive(Debug)]
pub struct FixPipeline {
    config: PipelineConfig,
    journal: Arc<OperationJournal>,
    provisioner: Arc<SandboxProvisioner>,
    validator: ValidatorPipeline,
    retention_sweeper: RetentionSweeper,
    session_sweeper: SessionSweeper,
}

impl FixPipeline {
    /// Open a pipeline for a project root
    ///
    /// Opens the journal first, which runs crash recovery before anything
    /// else can touch the tree, then spawns the retention and session
    /// sweeps under this handle's ownership.
    ///
    /// # Errors
    /// Fails when the journal cannot be opened or recovery fails.
    pub async fn open(config: PipelineConfig) -> Result<Self, RemedyError> {
        let journal_config = JournalConfig {
            backup_max_age: config.backup_max_age,
            sweep_interval: config.sweep_interval,
        };
        let journal =
            Arc::new(OperationJournal::open(&config.project_root, journal_config).await?);

        let retention_sweeper = RetentionSweeper::spawn(
            journal.backup_dir().to_path_buf(),
            config.backup_max_age,
            config.sweep_interval,
        );

        let provisioner = Arc::new(SandboxProvisioner::new(
            &config.scratch_root,
            config.sandbox_ttl,
        ));
        let session_sweeper = SessionSweeper::spawn(Arc::clone(&provisioner), config.sweep_interval);

        let store: Arc<dyn CheckResultStore> = Arc::new(JsonResultStore::new(&config.results_dir));
        let validator = ValidatorPipeline::new(config.validator.clone(), store);

        tracing::info!(root = %config.project_root.display(), "fix pipeline open");
        Ok(Self {
            config,
            journal,
            provisioner,
            validator,
            retention_sweeper,
            session_sweeper,
        })
    }

    /// Validate a proposed change set and, on a passing verdict, apply it
    /// to the live tree through the journal
    ///
    /// A failing verdict short-circuits before any live mutation - sandbox
    /// failure is a hard gate, never advisory. A live apply that fails
    /// mid-batch rolls back the operations already applied for this
    /// attempt before the error surfaces.
    ///
    /// # Errors
    /// - [`RemedyError::Sandbox`] when provisioning or sandbox application
    ///   fails (no usable session)
    /// - [`RemedyError::LiveApplyFailed`] when a journaled write fails
    ///   after validation passed
    pub async fn propose(&self, changes: &[ProposedChange]) -> Result<FixOutcome, RemedyError> {
        let attempt = AttemptId::new();
        tracing::info!(attempt = %attempt, count = changes.len(), "fix proposed");

        let session = self.provisioner.provision(&self.config.project_root).await?;

        let verdict = match self.validate_in_sandbox(attempt, &session, changes).await {
            Ok(verdict) => verdict,
            Err(e) => {
                self.provisioner.teardown(session.id).await;
                return Err(e);
            }
        };
        self.provisioner.teardown(session.id).await;

        if !verdict.passed {
            tracing::info!(attempt = %attempt, "verdict failed; live tree untouched");
            return Ok(FixOutcome::Rejected { attempt, verdict });
        }

        let operation_ids = self.apply_live(attempt, changes).await?;
        tracing::info!(
            attempt = %attempt,
            operations = operation_ids.len(),
            "fix applied; awaiting health signal"
        );
        Ok(FixOutcome::Applied {
            attempt,
            operation_ids,
            verdict,
        })
    }

    async fn validate_in_sandbox(
        &self,
        attempt: AttemptId,
        session: &SandboxSession,
        changes: &[ProposedChange],
    ) -> Result<ValidationVerdict, RemedyError> {
        self.provisioner.apply_changes(session.id, changes).await?;
        Ok(self.validator.run(&session.root, attempt).await?)
    }

    /// Apply a validated change set to the live tree, all-or-nothing
    async fn apply_live(
        &self,
        attempt: AttemptId,
        changes: &[ProposedChange],
    ) -> Result<Vec<OperationId>, RemedyError> {
        let mut applied = Vec::with_capacity(changes.len());

        for change in changes {
            let result = match change.operation {
                ChangeOp::Create | ChangeOp::Modify => {
                    let content = change.new_content.as_deref().ok_or_else(|| {
                        RemedyError::Sandbox(SandboxError::MissingContent(change.path.clone()))
                    })?;
                    self.journal
                        .write_with_backup(&change.path, content.as_bytes())
                        .await
                }
                ChangeOp::Delete => self.journal.delete_with_backup(&change.path).await,
            };

            match result {
                Ok(id) => applied.push(id),
                Err(source) => {
                    let rolled_back = self.abort_batch(&applied).await;
                    return Err(RemedyError::LiveApplyFailed {
                        attempt,
                        rolled_back,
                        source,
                    });
                }
            }
        }
        Ok(applied)
    }

    /// Roll back the already-applied prefix of a failed batch
    async fn abort_batch(&self, applied: &[OperationId]) -> Vec<OperationId> {
        let mut rolled_back = Vec::with_capacity(applied.len());
        // Newest first, so layered edits to the same path unwind cleanly.
        for id in applied.iter().rev() {
            match self.journal.rollback_operation(*id).await {
                Ok(()) => rolled_back.push(*id),
                Err(e) => {
                    tracing::error!(operation = %id, error = %e, "batch abort: rollback failed");
                }
            }
        }
        rolled_back
    }

    /// Commit applied operations, discarding their backups
    ///
    /// # Errors
    /// Propagates [`remedy_journal::JournalError`] for unknown ids or
    /// illegal transitions.
    pub async fn commit(&self, ids: &[OperationId]) -> Result<(), RemedyError> {
        self.journal.commit(ids).await.map_err(RemedyError::from)
    }

    /// Roll back one applied operation (idempotent)
    ///
    /// # Errors
    /// Propagates [`remedy_journal::JournalError`] when the restore fails.
    pub async fn rollback(&self, id: OperationId) -> Result<(), RemedyError> {
        self.journal
            .rollback_operation(id)
            .await
            .map_err(RemedyError::from)
    }

    /// Roll back every tracked non-terminal operation
    pub async fn rollback_all(&self) -> RollbackReport {
        self.journal.rollback_all().await
    }

    /// Snapshot of tracked non-terminal operations
    pub async fn active_operations(&self) -> Vec<MutationOperation> {
        self.journal.active_operations().await
    }

    /// Pipeline configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stop the background sweeps deterministically
    pub async fn shutdown(self) {
        self.retention_sweeper.shutdown().await;
        self.session_sweeper.shutdown().await;
        tracing::info!("fix pipeline shut down");
    }
}
